//! The `/games` resource.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::db::GameDatabase;
use crate::error::InsertError;
use crate::matches::Matches;
use crate::serializer::{mismatch, require, Field, Record, RowFields, SerializeError};
use crate::server::{CoreServer, Request, Response};

/// The status every new game starts in.
pub const ACTIVE_STATUS: i32 = 1;

/// A row of `games`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Game {
  pub game_id: Uuid,
  pub status_id: i32,
}

impl Record for Game {
  fn pack(self) -> RowFields {
    RowFields::from([
      ("game_id".to_owned(), Field::Uuid(self.game_id)),
      ("status_id".to_owned(), Field::Int(self.status_id)),
    ])
  }

  fn unpack(fields: &RowFields) -> Result<Self, SerializeError> {
    Ok(Game {
      game_id: require(fields, "game_id")?
        .as_uuid()
        .ok_or_else(|| mismatch("game_id"))?,
      status_id: require(fields, "status_id")?
        .as_int()
        .ok_or_else(|| mismatch("status_id"))?,
    })
  }
}

/// A row of `game_statuses`.
#[derive(Clone, Debug, PartialEq)]
pub struct GameStatus {
  pub status_id: i32,
  pub status_name: String,
}

impl Record for GameStatus {
  fn pack(self) -> RowFields {
    RowFields::from([
      ("status_id".to_owned(), Field::Int(self.status_id)),
      ("status_name".to_owned(), Field::Text(self.status_name)),
    ])
  }

  fn unpack(fields: &RowFields) -> Result<Self, SerializeError> {
    Ok(GameStatus {
      status_id: require(fields, "status_id")?
        .as_int()
        .ok_or_else(|| mismatch("status_id"))?,
      status_name: require(fields, "status_name")?
        .as_text()
        .ok_or_else(|| mismatch("status_name"))?
        .to_owned(),
    })
  }
}

fn game_url(game_id: Uuid) -> String {
  format!("/games/{}", game_id)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
  let mut response = hyper::Response::new(Full::from(body.to_string()));
  *response.status_mut() = status;
  response
    .headers_mut()
    .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
  response
}

fn internal_error() -> Response {
  json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({}))
}

/// Registers the game endpoints onto a server.
pub struct GameStore {
  db: Arc<dyn GameDatabase>,
}

impl GameStore {
  pub fn new(db: Arc<dyn GameDatabase>) -> Self {
    GameStore { db }
  }

  pub fn attach_to(&self, server: &mut CoreServer) -> Result<(), InsertError> {
    info!("registering game routes");

    let db = self.db.clone();
    server.get("/games", move |_req: Request, _matches: Matches| {
      let db = db.clone();
      async move {
        let games = match db.list_games().await {
          Ok(games) => games,
          Err(err) => {
            error!("failed to list games: {}", err);
            return Some(internal_error());
          }
        };
        info!("listed all games, count: {}", games.len());
        let entries: Vec<_> = games
          .iter()
          .map(|game| json!({ "url": game_url(game.game_id) }))
          .collect();
        Some(json_response(StatusCode::OK, json!({ "games": entries })))
      }
    })?;

    let db = self.db.clone();
    server.post("/games", move |_req: Request, _matches: Matches| {
      let db = db.clone();
      async move {
        let game = Game {
          game_id: Uuid::new_v4(),
          status_id: ACTIVE_STATUS,
        };
        if let Err(err) = db.create_game(game).await {
          error!("failed to create game: {}", err);
          return Some(internal_error());
        }
        info!("created game {}", game.game_id);
        Some(json_response(
          StatusCode::CREATED,
          json!({ "url": game_url(game.game_id) }),
        ))
      }
    })?;

    let db = self.db.clone();
    server.get("/games/{gameId}", move |_req: Request, matches: Matches| {
      let db = db.clone();
      async move {
        // an id that is not a UUID cannot name a game
        let game_id = Uuid::parse_str(matches.get("gameId")?).ok()?;
        match db.game_status(game_id).await {
          Ok(Some(status)) => {
            info!("game {} status requested", game_id);
            Some(json_response(
              StatusCode::OK,
              json!({ "url": game_url(game_id), "status": status.status_name }),
            ))
          }
          Ok(None) => {
            info!("game {} not found", game_id);
            None
          }
          Err(err) => {
            error!("failed to fetch game {}: {}", game_id, err);
            Some(internal_error())
          }
        }
      }
    })?;

    let db = self.db.clone();
    server.delete("/games/{gameId}", move |_req: Request, matches: Matches| {
      let db = db.clone();
      async move {
        let game_id = Uuid::parse_str(matches.get("gameId")?).ok()?;
        match db.delete_game(game_id).await {
          Ok(0) => {
            info!("game {} not found, nothing to delete", game_id);
            None
          }
          Ok(_) => {
            info!("deleted game {}", game_id);
            let mut response = hyper::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            Some(response)
          }
          Err(err) => {
            error!("failed to delete game {}: {}", game_id, err);
            Some(internal_error())
          }
        }
      }
    })?;

    Ok(())
  }
}
