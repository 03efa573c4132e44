//! Store Commands
//!
//! Typed commands and their positional wire encoding. Scores and TTLs travel
//! as strings.

use crate::error::StoreError;

// == Command ==
/// A single store command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        ttl_seconds: Option<u64>,
    },
    Del {
        key: String,
    },
    ZAdd {
        key: String,
        score: f64,
        member: String,
    },
    ZCard {
        key: String,
    },
    ZRange {
        key: String,
        start: i64,
        stop: i64,
        with_scores: bool,
    },
    ZRemRangeByScore {
        key: String,
        min: f64,
        max: f64,
    },
    Expire {
        key: String,
        seconds: u64,
    },
}

impl Command {
    /// Upper-case command name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Del { .. } => "DEL",
            Command::ZAdd { .. } => "ZADD",
            Command::ZCard { .. } => "ZCARD",
            Command::ZRange { .. } => "ZRANGE",
            Command::ZRemRangeByScore { .. } => "ZREMRANGEBYSCORE",
            Command::Expire { .. } => "EXPIRE",
        }
    }

    /// Key the command operates on.
    pub fn key(&self) -> &str {
        match self {
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::Del { key }
            | Command::ZAdd { key, .. }
            | Command::ZCard { key }
            | Command::ZRange { key, .. }
            | Command::ZRemRangeByScore { key, .. }
            | Command::Expire { key, .. } => key,
        }
    }

    // == Encode ==
    /// Encodes the command as the JSON array body `["CMD", "arg", ...]`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![self.name().to_string(), self.key().to_string()];

        match self {
            Command::Get { .. } | Command::Del { .. } | Command::ZCard { .. } => {}
            Command::Set {
                value, ttl_seconds, ..
            } => {
                args.push(value.clone());
                if let Some(ttl) = ttl_seconds {
                    args.push("EX".to_string());
                    args.push(ttl.to_string());
                }
            }
            Command::ZAdd { score, member, .. } => {
                args.push(score.to_string());
                args.push(member.clone());
            }
            Command::ZRange {
                start,
                stop,
                with_scores,
                ..
            } => {
                args.push(start.to_string());
                args.push(stop.to_string());
                if *with_scores {
                    args.push("WITHSCORES".to_string());
                }
            }
            Command::ZRemRangeByScore { min, max, .. } => {
                args.push(min.to_string());
                args.push(max.to_string());
            }
            Command::Expire { seconds, .. } => {
                args.push(seconds.to_string());
            }
        }

        args
    }

    // == Decode ==
    /// Parses a wire array back into a command.
    ///
    /// Command names are case-insensitive, matching the store's behaviour.
    pub fn from_args(args: &[String]) -> Result<Self, StoreError> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| StoreError::Command("empty command".to_string()))?;
        let name = name.to_ascii_uppercase();

        let arity = |min: usize, max: usize| {
            if rest.len() < min || rest.len() > max {
                Err(StoreError::Command(format!(
                    "wrong number of arguments for '{}' command",
                    name.to_lowercase()
                )))
            } else {
                Ok(())
            }
        };

        let command = match name.as_str() {
            "GET" => {
                arity(1, 1)?;
                Command::Get { key: rest[0].clone() }
            }
            "SET" => {
                arity(2, 4)?;
                let ttl_seconds = match &rest[2..] {
                    [] => None,
                    [flag, ttl] if flag.eq_ignore_ascii_case("EX") => Some(parse_u64(ttl)?),
                    _ => return Err(StoreError::Command("syntax error".to_string())),
                };
                Command::Set {
                    key: rest[0].clone(),
                    value: rest[1].clone(),
                    ttl_seconds,
                }
            }
            "DEL" => {
                arity(1, 1)?;
                Command::Del { key: rest[0].clone() }
            }
            "ZADD" => {
                arity(3, 3)?;
                Command::ZAdd {
                    key: rest[0].clone(),
                    score: parse_score(&rest[1])?,
                    member: rest[2].clone(),
                }
            }
            "ZCARD" => {
                arity(1, 1)?;
                Command::ZCard { key: rest[0].clone() }
            }
            "ZRANGE" => {
                arity(3, 4)?;
                let with_scores = match rest.get(3) {
                    None => false,
                    Some(flag) if flag.eq_ignore_ascii_case("WITHSCORES") => true,
                    Some(_) => return Err(StoreError::Command("syntax error".to_string())),
                };
                Command::ZRange {
                    key: rest[0].clone(),
                    start: parse_i64(&rest[1])?,
                    stop: parse_i64(&rest[2])?,
                    with_scores,
                }
            }
            "ZREMRANGEBYSCORE" => {
                arity(3, 3)?;
                Command::ZRemRangeByScore {
                    key: rest[0].clone(),
                    min: parse_score(&rest[1])?,
                    max: parse_score(&rest[2])?,
                }
            }
            "EXPIRE" => {
                arity(2, 2)?;
                Command::Expire {
                    key: rest[0].clone(),
                    seconds: parse_u64(&rest[1])?,
                }
            }
            other => {
                return Err(StoreError::Command(format!("unknown command '{}'", other)));
            }
        };

        Ok(command)
    }
}

fn parse_u64(raw: &str) -> Result<u64, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Command("value is not an integer or out of range".to_string()))
}

fn parse_i64(raw: &str) -> Result<i64, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Command("value is not an integer or out of range".to_string()))
}

fn parse_score(raw: &str) -> Result<f64, StoreError> {
    match raw {
        "-inf" => Ok(f64::NEG_INFINITY),
        "+inf" | "inf" => Ok(f64::INFINITY),
        _ => raw
            .parse::<f64>()
            .ok()
            .filter(|score| !score.is_nan())
            .ok_or_else(|| StoreError::Command("value is not a valid float".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_set_with_ttl_encoding() {
        let command = Command::Set {
            key: "k".into(),
            value: "v".into(),
            ttl_seconds: Some(60),
        };
        assert_eq!(command.to_args(), args(&["SET", "k", "v", "EX", "60"]));
    }

    #[test]
    fn test_set_without_ttl_encoding() {
        let command = Command::Set {
            key: "k".into(),
            value: "v".into(),
            ttl_seconds: None,
        };
        assert_eq!(command.to_args(), args(&["SET", "k", "v"]));
    }

    #[test]
    fn test_scores_are_encoded_as_integers_when_whole() {
        let command = Command::ZAdd {
            key: "rl".into(),
            score: 1_700_000_000_123.0,
            member: "m".into(),
        };
        assert_eq!(
            command.to_args(),
            args(&["ZADD", "rl", "1700000000123", "m"])
        );
    }

    #[test]
    fn test_zrange_withscores_encoding() {
        let command = Command::ZRange {
            key: "rl".into(),
            start: 0,
            stop: 0,
            with_scores: true,
        };
        assert_eq!(command.to_args(), args(&["ZRANGE", "rl", "0", "0", "WITHSCORES"]));
    }

    #[test]
    fn test_from_args_is_case_insensitive() {
        let command = Command::from_args(&args(&["zcard", "rl"])).unwrap();
        assert_eq!(command, Command::ZCard { key: "rl".into() });
    }

    #[test]
    fn test_from_args_parses_every_encoding() {
        let commands = vec![
            Command::Get { key: "a".into() },
            Command::Set {
                key: "a".into(),
                value: "1".into(),
                ttl_seconds: Some(5),
            },
            Command::Del { key: "a".into() },
            Command::ZRemRangeByScore {
                key: "z".into(),
                min: 0.0,
                max: 1234.0,
            },
            Command::Expire {
                key: "z".into(),
                seconds: 61,
            },
        ];

        for command in commands {
            let parsed = Command::from_args(&command.to_args()).unwrap();
            assert_eq!(parsed, command);
        }
    }

    #[test]
    fn test_from_args_rejects_bad_input() {
        assert!(Command::from_args(&[]).is_err());
        assert!(Command::from_args(&args(&["FLUSHALL"])).is_err());
        assert!(Command::from_args(&args(&["GET"])).is_err());
        assert!(Command::from_args(&args(&["SET", "k", "v", "PX", "10"])).is_err());
        assert!(Command::from_args(&args(&["ZADD", "k", "nan", "m"])).is_err());
        assert!(Command::from_args(&args(&["EXPIRE", "k", "-1"])).is_err());
    }
}
