//! Conversion between database rows and plain records.
//!
//! A row travels as a [`RowFields`] map of column name to [`Field`] value;
//! [`Record`] moves whole structs in and out of that map. The [`Field`]
//! variants cover exactly the column types the schema uses.

use std::collections::BTreeMap;
use std::fmt;

use bytes::BytesMut;
use thiserror::Error;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

/// One database value.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
  Null,
  Text(String),
  Uuid(Uuid),
  SmallInt(i16),
  Int(i32),
  BigInt(i64),
  Real(f32),
}

impl Field {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Field::Text(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_uuid(&self) -> Option<Uuid> {
    match self {
      Field::Uuid(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i32> {
    match self {
      Field::Int(value) => Some(*value),
      _ => None,
    }
  }
}

/// Renders the SQL-literal spelling of the value. Only used when logging
/// statements; execution always goes through bound parameters.
impl fmt::Display for Field {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Field::Null => f.write_str("NULL"),
      Field::Text(value) => write!(f, "'{}'", value),
      Field::Uuid(value) => write!(f, "'{}'::uuid", value),
      Field::SmallInt(value) => write!(f, "{}", value),
      Field::Int(value) => write!(f, "{}", value),
      Field::BigInt(value) => write!(f, "{}", value),
      Field::Real(value) => write!(f, "{}", value),
    }
  }
}

impl ToSql for Field {
  fn to_sql(
    &self,
    ty: &Type,
    out: &mut BytesMut,
  ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
    match self {
      Field::Null => Ok(IsNull::Yes),
      Field::Text(value) => value.to_sql(ty, out),
      Field::Uuid(value) => value.to_sql(ty, out),
      Field::SmallInt(value) => value.to_sql(ty, out),
      Field::Int(value) => value.to_sql(ty, out),
      Field::BigInt(value) => value.to_sql(ty, out),
      Field::Real(value) => value.to_sql(ty, out),
    }
  }

  fn accepts(ty: &Type) -> bool {
    [
      Type::TEXT,
      Type::VARCHAR,
      Type::UUID,
      Type::INT2,
      Type::INT4,
      Type::INT8,
      Type::FLOAT4,
    ]
    .contains(ty)
  }

  to_sql_checked!();
}

/// A row as a name-to-value map. Ordered, so generated SQL lists columns
/// deterministically.
pub type RowFields = BTreeMap<String, Field>;

/// Errors converting between rows and records.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SerializeError {
  #[error("row has no column '{column}'")]
  Missing { column: String },
  #[error("column '{column}' holds an unexpected type")]
  TypeMismatch { column: String },
  #[error("column '{column}' has unsupported type {ty}")]
  Unsupported { column: String, ty: String },
}

/// A struct that can be packed into a row and unpacked back out of one.
pub trait Record: Sized {
  fn pack(self) -> RowFields;
  fn unpack(fields: &RowFields) -> Result<Self, SerializeError>;
}

/// Looks a column up, failing with [`SerializeError::Missing`].
pub fn require<'a>(fields: &'a RowFields, column: &str) -> Result<&'a Field, SerializeError> {
  fields.get(column).ok_or_else(|| SerializeError::Missing {
    column: column.to_owned(),
  })
}

pub(crate) fn mismatch(column: &str) -> SerializeError {
  SerializeError::TypeMismatch {
    column: column.to_owned(),
  }
}

/// Converts a result row into a [`RowFields`] map.
pub fn unpack_row(row: &Row) -> Result<RowFields, SerializeError> {
  let mut fields = RowFields::new();

  for (idx, column) in row.columns().iter().enumerate() {
    let name = column.name();
    let ty = column.type_();

    let value = if *ty == Type::UUID {
      row.try_get::<_, Option<Uuid>>(idx).map(|v| v.map(Field::Uuid))
    } else if *ty == Type::INT2 {
      row
        .try_get::<_, Option<i16>>(idx)
        .map(|v| v.map(Field::SmallInt))
    } else if *ty == Type::INT4 {
      row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Field::Int))
    } else if *ty == Type::INT8 {
      row
        .try_get::<_, Option<i64>>(idx)
        .map(|v| v.map(Field::BigInt))
    } else if *ty == Type::FLOAT4 {
      row.try_get::<_, Option<f32>>(idx).map(|v| v.map(Field::Real))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
      row
        .try_get::<_, Option<String>>(idx)
        .map(|v| v.map(Field::Text))
    } else {
      return Err(SerializeError::Unsupported {
        column: name.to_owned(),
        ty: ty.to_string(),
      });
    };

    let field = value.map_err(|_| mismatch(name))?.unwrap_or(Field::Null);
    fields.insert(name.to_owned(), field);
  }

  Ok(fields)
}
