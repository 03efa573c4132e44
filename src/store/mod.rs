//! Remote Store Module
//!
//! Command-based client for the shared key-value store. Every typed operation
//! is one [`Command`], sent as a JSON array `["CMD", "arg", ...]` and answered
//! with `{"result": <value>}`.

mod command;
mod http;
mod memory;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

pub use command::Command;
pub use http::{HttpRemoteStore, HttpStoreConfig};
pub use memory::MemoryRemoteStore;

// == Scored Member ==
/// One element of a `ZRANGE` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    /// Present only when the range was requested with scores
    pub score: Option<f64>,
}

// == Remote Store Trait ==
/// Shared key-value store reachable through the command protocol.
///
/// Implementors only provide [`RemoteStore::execute`]; the typed helpers
/// build the command and decode the reply.
#[async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Runs a single command and returns the raw `result` value.
    async fn execute(&self, command: Command) -> Result<Value, StoreError>;

    /// `GET key`. Absent keys are `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let reply = self.execute(Command::Get { key: key.to_string() }).await?;
        match reply {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(unexpected("GET", &other)),
        }
    }

    /// `SET key value [EX ttl]`. Without a TTL the key never expires.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<(), StoreError> {
        self.execute(Command::Set {
            key: key.to_string(),
            value: value.to_string(),
            ttl_seconds,
        })
        .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.execute(Command::Del { key: key.to_string() }).await?;
        Ok(())
    }

    /// Removes sorted-set members whose score lies in `[min, max]`.
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> Result<(), StoreError> {
        self.execute(Command::ZRemRangeByScore {
            key: key.to_string(),
            min,
            max,
        })
        .await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let reply = self.execute(Command::ZCard { key: key.to_string() }).await?;
        as_integer("ZCARD", &reply)
    }

    /// Members by rank, lowest score first. Negative indices count from the end.
    async fn zrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
        with_scores: bool,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let reply = self
            .execute(Command::ZRange {
                key: key.to_string(),
                start,
                stop,
                with_scores,
            })
            .await?;
        decode_range(&reply, with_scores)
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), StoreError> {
        self.execute(Command::ZAdd {
            key: key.to_string(),
            score,
            member: member.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        self.execute(Command::Expire {
            key: key.to_string(),
            seconds,
        })
        .await?;
        Ok(())
    }
}

// == Reply Decoding ==
fn unexpected(command: &str, value: &Value) -> StoreError {
    StoreError::Protocol(format!("unexpected {} reply: {}", command, value))
}

fn as_integer(command: &str, value: &Value) -> Result<u64, StoreError> {
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(|| unexpected(command, value)),
        // Some deployments stringify integers
        Value::String(s) => s.parse().map_err(|_| unexpected(command, value)),
        other => Err(unexpected(command, other)),
    }
}

fn parse_score(value: &Value) -> Result<f64, StoreError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| unexpected("ZRANGE", value)),
        Value::String(s) => s.parse().map_err(|_| unexpected("ZRANGE", value)),
        other => Err(unexpected("ZRANGE", other)),
    }
}

fn decode_range(reply: &Value, with_scores: bool) -> Result<Vec<ScoredMember>, StoreError> {
    let items = match reply {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => return Err(unexpected("ZRANGE", other)),
    };

    let member_of = |value: &Value| match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(unexpected("ZRANGE", other)),
    };

    if !with_scores {
        return items
            .iter()
            .map(|item| {
                Ok(ScoredMember {
                    member: member_of(item)?,
                    score: None,
                })
            })
            .collect();
    }

    if items.len() % 2 != 0 {
        return Err(StoreError::Protocol(
            "ZRANGE WITHSCORES reply has odd length".to_string(),
        ));
    }

    items
        .chunks(2)
        .map(|pair| {
            Ok(ScoredMember {
                member: member_of(&pair[0])?,
                score: Some(parse_score(&pair[1])?),
            })
        })
        .collect()
}
