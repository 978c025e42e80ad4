//! Game persistence.
//!
//! [`GameDatabase`] is the seam between the HTTP resource handlers and the
//! storage backing them; [`Postgres`] is the production implementation.
//! Tests substitute an in-memory implementation of the same trait.

use std::env;

use async_trait::async_trait;
use thiserror::Error;
use tokio_postgres::NoTls;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::query::QueryBuilder;
use crate::serializer::{unpack_row, Field, Record, SerializeError};
use crate::store::{Game, GameStatus};

#[derive(Debug, Error)]
pub enum DbError {
  #[error("database error: {0}")]
  Postgres(#[from] tokio_postgres::Error),
  #[error(transparent)]
  Serialize(#[from] SerializeError),
}

/// Storage operations for the `/games` resource.
#[async_trait]
pub trait GameDatabase: Send + Sync {
  async fn create_game(&self, game: Game) -> Result<(), DbError>;
  async fn list_games(&self) -> Result<Vec<Game>, DbError>;
  /// The game's status record, joined through `game_statuses`. `None` when
  /// the game does not exist.
  async fn game_status(&self, game_id: Uuid) -> Result<Option<GameStatus>, DbError>;
  /// Removes the game, returning how many rows went away.
  async fn delete_game(&self, game_id: Uuid) -> Result<u64, DbError>;
}

/// Connection parameters, read from the `DB_*` environment.
#[derive(Clone, Debug)]
pub struct DbConfig {
  pub host: String,
  pub port: u16,
  pub user: String,
  pub password: String,
  pub dbname: String,
}

impl DbConfig {
  pub fn from_env() -> Self {
    DbConfig {
      host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_owned()),
      port: env::var("DB_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5432),
      user: env::var("DB_USER").unwrap_or_else(|_| "joe".to_owned()),
      password: env::var("DB_PASSWORD").unwrap_or_else(|_| "12345678".to_owned()),
      dbname: env::var("DB_NAME").unwrap_or_else(|_| "road_n_roll".to_owned()),
    }
  }

  fn conn_string(&self) -> String {
    format!(
      "user={} password={} host={} port={} dbname={}",
      self.user, self.password, self.host, self.port, self.dbname
    )
  }
}

/// Postgres-backed storage over a single connection driven by a background
/// task.
pub struct Postgres {
  client: tokio_postgres::Client,
}

impl Postgres {
  pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
    let (client, connection) = tokio_postgres::connect(&config.conn_string(), NoTls).await?;
    tokio::spawn(async move {
      if let Err(err) = connection.await {
        error!("database connection error: {}", err);
      }
    });
    info!(
      "connected to database {} at {}:{}",
      config.dbname, config.host, config.port
    );
    Ok(Postgres { client })
  }

  /// Creates the two tables when missing and seeds the active status.
  pub async fn ensure_schema(&self) -> Result<(), DbError> {
    self
      .client
      .batch_execute(
        "
        CREATE TABLE IF NOT EXISTS game_statuses (
            status_id INT PRIMARY KEY,
            status_name TEXT
        );
        CREATE TABLE IF NOT EXISTS games (
            game_id UUID PRIMARY KEY,
            status_id INT
        );
        INSERT INTO game_statuses (status_id, status_name)
            VALUES (1, 'Активна')
            ON CONFLICT (status_id) DO NOTHING;
        ",
      )
      .await?;
    Ok(())
  }
}

#[async_trait]
impl GameDatabase for Postgres {
  async fn create_game(&self, game: Game) -> Result<(), DbError> {
    let query = QueryBuilder::insert("games", game.pack());
    debug!("executing query: {}", query);
    self.client.execute(query.sql.as_str(), &query.params()).await?;
    Ok(())
  }

  async fn list_games(&self) -> Result<Vec<Game>, DbError> {
    let query = QueryBuilder::generic("SELECT game_id, status_id FROM games", Vec::new());
    debug!("executing query: {}", query);
    let rows = self.client.query(query.sql.as_str(), &query.params()).await?;
    rows
      .iter()
      .map(|row| Ok(Game::unpack(&unpack_row(row)?)?))
      .collect()
  }

  async fn game_status(&self, game_id: Uuid) -> Result<Option<GameStatus>, DbError> {
    let query = QueryBuilder::generic(
      "SELECT gs.status_id, gs.status_name \
       FROM games g JOIN game_statuses gs ON gs.status_id = g.status_id \
       WHERE g.game_id = $1",
      vec![Field::Uuid(game_id)],
    );
    debug!("executing query: {}", query);
    let rows = self.client.query(query.sql.as_str(), &query.params()).await?;
    match rows.first() {
      Some(row) => Ok(Some(GameStatus::unpack(&unpack_row(row)?)?)),
      None => Ok(None),
    }
  }

  async fn delete_game(&self, game_id: Uuid) -> Result<u64, DbError> {
    let query = QueryBuilder::generic(
      "DELETE FROM games WHERE game_id = $1",
      vec![Field::Uuid(game_id)],
    );
    debug!("executing query: {}", query);
    let removed = self.client.execute(query.sql.as_str(), &query.params()).await?;
    Ok(removed)
  }
}
