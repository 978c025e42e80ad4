//! SQL statement construction.

use std::fmt;

use tokio_postgres::types::ToSql;

use crate::serializer::{Field, RowFields};

/// A statement with its positional parameters.
pub struct Query {
  pub sql: String,
  pub params: Vec<Field>,
}

impl Query {
  /// The parameter slice in the form the client executor expects.
  pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
    self
      .params
      .iter()
      .map(|field| field as &(dyn ToSql + Sync))
      .collect()
  }
}

/// Renders the statement with its parameters spelled out as SQL literals,
/// the form the query log shows.
impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.sql)?;
    if !self.params.is_empty() {
      f.write_str(" [")?;
      for (idx, param) in self.params.iter().enumerate() {
        if idx > 0 {
          f.write_str(", ")?;
        }
        write!(f, "${} = {}", idx + 1, param)?;
      }
      f.write_str("]")?;
    }
    Ok(())
  }
}

pub struct QueryBuilder;

impl QueryBuilder {
  /// Builds `INSERT INTO <table> (<columns>) VALUES ($1, …)` from a row map.
  pub fn insert(table: &str, fields: RowFields) -> Query {
    let mut columns = Vec::with_capacity(fields.len());
    let mut placeholders = Vec::with_capacity(fields.len());
    let mut params = Vec::with_capacity(fields.len());

    for (idx, (column, value)) in fields.into_iter().enumerate() {
      columns.push(column);
      placeholders.push(format!("${}", idx + 1));
      params.push(value);
    }

    Query {
      sql: format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
      ),
      params,
    }
  }

  /// Wraps a hand-written statement with its parameters.
  pub fn generic(sql: impl Into<String>, params: Vec<Field>) -> Query {
    Query {
      sql: sql.into(),
      params,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  #[test]
  fn insert_statement() {
    let fields = RowFields::from([
      ("game_id".to_owned(), Field::Uuid(Uuid::nil())),
      ("status_id".to_owned(), Field::Int(1)),
    ]);
    let query = QueryBuilder::insert("games", fields);

    // column order follows the ordered row map
    assert_eq!(query.sql, "INSERT INTO games (game_id, status_id) VALUES ($1, $2)");
    assert_eq!(
      query.params,
      vec![Field::Uuid(Uuid::nil()), Field::Int(1)]
    );
  }

  #[test]
  fn generic_statement() {
    let query = QueryBuilder::generic(
      "DELETE FROM games WHERE game_id = $1",
      vec![Field::Uuid(Uuid::nil())],
    );
    assert_eq!(query.params().len(), 1);
  }

  #[test]
  fn display_spells_out_parameters() {
    let query = QueryBuilder::generic(
      "SELECT status_name FROM game_statuses WHERE status_id = $1",
      vec![Field::Int(1)],
    );
    assert_eq!(
      query.to_string(),
      "SELECT status_name FROM game_statuses WHERE status_id = $1 [$1 = 1]"
    );
  }
}
