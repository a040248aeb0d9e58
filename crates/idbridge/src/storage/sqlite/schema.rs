//! SQL statement builders for the user table.
//!
//! Table and column names come from the backend configuration and cannot be
//! bound as parameters, so they are always quoted with [`quote_ident`].
//! Every value is a numbered parameter (`?1`, `?2`, ...). Pure functions, no I/O.

/// Quotes an identifier, doubling any embedded double quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Creates the user table if it does not exist.
///
/// `id` is the row identifier; the key column is unique and mandatory; every
/// other managed column is nullable text.
pub fn create_table<S: AsRef<str>>(table: &str, key: &str, columns: &[S]) -> String {
    let mut definitions = vec!["\"id\" INTEGER PRIMARY KEY".to_string()];
    for column in columns {
        let column: &str = column.as_ref();
        if column == "id" {
            continue;
        }
        if column == key {
            definitions.push(format!("{} TEXT UNIQUE NOT NULL", quote_ident(column)));
        } else {
            definitions.push(format!("{} TEXT", quote_ident(column)));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table),
        definitions.join(",\n    ")
    )
}

/// Selects `columns` of the row whose key equals `?1`.
pub fn select_user<S: AsRef<str>>(table: &str, key: &str, columns: &[S]) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        column_list(columns),
        quote_ident(table),
        quote_ident(key)
    )
}

/// Selects a single column of the row whose key equals `?1`.
pub fn select_column(table: &str, key: &str, column: &str) -> String {
    select_user(table, key, &[column])
}

/// Inserts one row; values bind to `?1..?n` in column order.
pub fn insert_user<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        column_list(columns),
        placeholders
    )
}

/// Updates `columns` (bound to `?1..?n`) of the row whose key equals `?{n+1}`.
pub fn update_user<S: AsRef<str>>(table: &str, key: &str, columns: &[S]) -> String {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote_ident(c.as_ref()), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_ident(table),
        assignments,
        quote_ident(key),
        columns.len() + 1
    )
}

/// Deletes the row whose key equals `?1`.
pub fn delete_user(table: &str, key: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?1",
        quote_ident(table),
        quote_ident(key)
    )
}

/// Selects every row where any of `search_columns` matches the regular
/// expression bound to `?1`, ordered by key.
pub fn search_users<S: AsRef<str>>(
    table: &str,
    key: &str,
    columns: &[S],
    search_columns: &[S],
) -> String {
    let conditions = search_columns
        .iter()
        .map(|c| format!("{} REGEXP ?1", quote_ident(c.as_ref())))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        column_list(columns),
        quote_ident(table),
        conditions,
        quote_ident(key)
    )
}
