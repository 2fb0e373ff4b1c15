pub const SAMPLE_PROBLEMS: &str = r#"problems:
  - id: 1
    title: Highest paid employee
    marks: 10
    schema: |
      CREATE TABLE `employees` (
        `id` INT(11) NOT NULL AUTO_INCREMENT,
        `name` VARCHAR(50) NOT NULL,
        `salary` DECIMAL(10,2),
        PRIMARY KEY (`id`)
      ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
    testCases:
      - sampleData: |
          INSERT INTO employees (name, salary) VALUES ('Ann', 4200), ('Bo', 5100), ('Cy', 3900);
        expectedOutput:
          - name: Bo
      - sampleData: |
          INSERT INTO employees (name, salary) VALUES ('Dee', 100);
        expectedOutput:
          - name: Dee
"#;
