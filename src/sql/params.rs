//! Named bind keys. Condition keys derive from table and column so joined tables never collide.

/// Reduce a name to characters valid in a named parameter.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Base key for a condition on `table.column`. A column that is already qualified keeps its own table.
pub fn condition_key(table: &str, column: &str) -> String {
    if column.contains('.') {
        sanitize(column)
    } else {
        sanitize(&format!("{}_{}", table, column))
    }
}

/// Base key for a written field.
pub fn field_key(column: &str) -> String {
    sanitize(&format!("field_{}", column))
}
