use ledger_migrate::Migration;

pub const NAME: &str = "001_create_users_table";

const UP: &str = "
CREATE TABLE users (
    id SERIAL PRIMARY KEY,
    first_name VARCHAR(50) NOT NULL,
    last_name VARCHAR(50) NOT NULL,
    email VARCHAR(50) NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);
";

const DOWN: &str = "DROP TABLE IF EXISTS users;";

pub fn migration() -> Migration {
    Migration::sql(NAME, UP, DOWN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_migrate::SqlAction;

    #[test]
    fn test_users_table_sql_parses_as_single_statements() {
        let up = SqlAction::new(UP);
        assert_eq!(up.statements().len(), 1);
        assert!(up.statements()[0].starts_with("CREATE TABLE users"));
        assert!(up.statements()[0].contains("updated_at"));

        let down = SqlAction::new(DOWN);
        assert_eq!(down.statements(), &["DROP TABLE IF EXISTS users;".to_string()]);
    }
}
