//! Environment-backed configuration.
//!
//! Variables map onto [`Env`] by `SCREAMING_SNAKE_CASE` field name. Values arrive as strings, so
//! the [`Val`] deserializer below parses numbers/bools/enums on demand and treats empty strings as
//! unset options. Unknown variables are ignored.

use std::path::PathBuf;

use serde::Deserialize;
use serde::de::value::MapDeserializer;
use serde::de::{self, IntoDeserializer};
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://snake_game.db";
pub const DEFAULT_LOG_FILTER: &str =
    "snake_scoreboard=debug,tower_http=debug,axum=debug,sqlx=info,info";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Env {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_frontend_dist")]
    pub frontend_dist: PathBuf,
    #[serde(default = "default_cors_allow_origins")]
    pub cors_allow_origins: String,
    pub rust_log: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
    pub otel_exporter_otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub api_service_name: String,
    #[serde(default = "default_tracer_name")]
    pub api_tracer_name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_server_host() -> String {
    String::from("0.0.0.0")
}

#[inline]
const fn default_server_port() -> u16 {
    8000
}

fn default_frontend_dist() -> PathBuf {
    PathBuf::from("frontend").join("dist")
}

fn default_cors_allow_origins() -> String {
    String::from("*")
}

fn default_service_name() -> String {
    String::from("snake-scoreboard-api")
}

fn default_tracer_name() -> String {
    String::from("snake-scoreboard-tracer")
}

impl Env {
    /// Loads `.env` (if any) into the process environment, then reads the configuration from it.
    pub fn load() -> EnvResult<Self> {
        match dotenvy::dotenv() {
            Ok(_) => (),
            Err(e) if e.not_found() => (),
            Err(e) => return Err(e.into()),
        }

        Ok(from_iter(std::env::vars())?)
    }

    pub fn log_filter(&self) -> &str {
        self.rust_log.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

// ---
//  Deserializer implementation
// ---

/// `(variable name, raw value)`
struct Val(String, String);

impl<'de> IntoDeserializer<'de, EnvDeserializeError> for Val {
    type Deserializer = Self;
    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

macro_rules! forward_parsed_vals {
    ($($ty:ident => $method:ident,)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, EnvDeserializeError>
            where
                V: de::Visitor<'de>
            {
                match self.1.trim().parse::<$ty>() {
                    Ok(val) => val.into_deserializer().$method(visitor),
                    Err(e) => Err(de::Error::custom(format_args!(
                        "{}: while parsing '{}' (variable: {})",
                        e, self.1, self.0
                    )))
                }
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Val {
    type Error = EnvDeserializeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        self.1.into_deserializer().deserialize_any(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        if self.1.trim().is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_enum<V>(
        self,
        _: &'static str,
        _: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.1.trim().to_lowercase().into_deserializer())
    }

    fn deserialize_newtype_struct<V>(
        self,
        _: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    forward_parsed_vals! {
        bool => deserialize_bool,
        u8 => deserialize_u8,
        u16 => deserialize_u16,
        u32 => deserialize_u32,
        u64 => deserialize_u64,
        i32 => deserialize_i32,
        i64 => deserialize_i64,
    }

    serde::forward_to_deserialize_any! {
        i8 i16 f32 f64 char str string unit seq bytes byte_buf map
        unit_struct tuple_struct identifier tuple ignored_any struct
    }
}

pub fn from_iter<Iter, T>(iter: Iter) -> Result<T, EnvDeserializeError>
where
    T: de::DeserializeOwned,
    Iter: IntoIterator<Item = (String, String)>,
{
    let vars = iter.into_iter().map(|(k, v)| (k.clone(), Val(k, v)));
    T::deserialize(MapDeserializer::new(vars))
}

impl de::Error for EnvDeserializeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        EnvDeserializeError::Custom(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        EnvDeserializeError::MissingValue(field.into())
    }
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error(transparent)]
    DeserializationError(#[from] EnvDeserializeError),
}

#[derive(Debug, Error)]
pub enum EnvDeserializeError {
    #[error("env deserialization error: {0}")]
    Custom(String),

    #[error("missing environment variable {0}")]
    MissingValue(String),
}

#[cfg(test)]
mod test {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let env: Env = from_iter(vars(&[("PATH", "/usr/bin"), ("HOME", "/root")])).unwrap();

        assert_eq!(env.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(env.server_port, 8000);
        assert_eq!(env.frontend_dist, PathBuf::from("frontend/dist"));
        assert_eq!(env.cors_allow_origins, "*");
        assert_eq!(env.log_format, LogFormat::Pretty);
        assert_eq!(env.log_filter(), DEFAULT_LOG_FILTER);
        assert!(env.otel_exporter_otlp_endpoint.is_none());
    }

    #[test]
    fn test_overrides() {
        let env: Env = from_iter(vars(&[
            ("DATABASE_URL", "sqlite://scores.db"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9001"),
            ("FRONTEND_DIST", "/srv/dist"),
            ("LOG_FORMAT", "JSON"),
            ("RUST_LOG", "warn"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
        ]))
        .unwrap();

        assert_eq!(env.database_url, "sqlite://scores.db");
        assert_eq!(env.bind_addr(), "127.0.0.1:9001");
        assert_eq!(env.frontend_dist, PathBuf::from("/srv/dist"));
        assert_eq!(env.log_format, LogFormat::Json);
        assert_eq!(env.log_filter(), "warn");
        assert_eq!(
            env.otel_exporter_otlp_endpoint.as_deref(),
            Some("http://localhost:4317")
        );
    }

    #[test]
    fn test_empty_option_is_unset() {
        let env: Env = from_iter(vars(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "")])).unwrap();
        assert!(env.otel_exporter_otlp_endpoint.is_none());
    }

    #[test]
    fn test_bad_port() {
        let res = from_iter::<_, Env>(vars(&[("SERVER_PORT", "eighty")]));
        assert!(matches!(res, Err(EnvDeserializeError::Custom(_))));
    }
}
