use super::flags;
use super::robots::RobotsMode;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

/// Accepted values for `log_level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Scan configuration consumed by expansion and the work queue
///
/// Built once at startup and read-only afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScanSettings {
    /// Seed URLs
    #[serde(default, deserialize_with = "string_or_list")]
    pub base_urls: Vec<String>,
    /// Extensions appended to candidate paths (leading dot optional)
    #[serde(default = "default_extensions", deserialize_with = "string_or_list")]
    pub extensions: Vec<String>,
    /// Response codes whose discoveries are expanded further
    #[serde(default = "default_spider_codes", deserialize_with = "string_or_list")]
    pub spider_codes: Vec<u16>,
    #[serde(default)]
    pub robots_mode: RobotsMode,
    /// Disallowed path prefixes supplied by the robots.txt collaborator
    #[serde(default, deserialize_with = "string_or_list")]
    pub robots_disallow: Vec<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    /// Request timeout for the fetch layer
    #[serde(default = "default_timeout", with = "duration_text")]
    pub timeout: Duration,
    /// Emit case-permuted variants of each path
    #[serde(default)]
    pub mangle_case: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(skip)]
    initialized: bool,
}

impl ScanSettings {
    /// Defaults, marked initialised
    pub fn new() -> Self {
        Self {
            initialized: true,
            ..Self::uninitialized()
        }
    }

    /// Defaults that still have to pass validation before use
    pub(crate) fn uninitialized() -> Self {
        Self {
            base_urls: Vec::new(),
            extensions: default_extensions(),
            spider_codes: default_spider_codes(),
            robots_mode: RobotsMode::default(),
            robots_disallow: Vec::new(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            max_depth: default_max_depth(),
            timeout: default_timeout(),
            mangle_case: false,
            log_level: default_log_level(),
            initialized: false,
        }
    }

    /// Whether these settings passed validation and may be read by consumers
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn clear_initialized(&mut self) {
        self.initialized = false;
    }

    /// Spiderable status codes, de-duplicated
    pub fn spider_code_set(&self) -> BTreeSet<u16> {
        self.spider_codes.iter().copied().collect()
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::new()
    }
}

fn default_extensions() -> Vec<String> {
    ["html", "php", "asp", "aspx"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_spider_codes() -> Vec<u16> {
    vec![200, 301, 302, 303, 307, 308, 401, 403]
}

fn default_workers() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_depth() -> u32 {
    5
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> String {
    "info".to_string()
}

mod duration_text {
    use crate::humanize::HumanDuration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        HumanDuration(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        HumanDuration::deserialize(deserializer).map(|d| d.as_duration())
    }
}

/// Element types that can be read from a comma list or a sequence
trait ListElement: Sized {
    fn parse_list(text: &str) -> Result<Vec<Self>, flags::FlagError>;
}

impl ListElement for String {
    fn parse_list(text: &str) -> Result<Vec<Self>, flags::FlagError> {
        flags::parse_string_list(text)
    }
}

impl ListElement for u16 {
    fn parse_list(text: &str) -> Result<Vec<Self>, flags::FlagError> {
        flags::parse_int_list(text)
    }
}

/// Accept `"a,b,c"` as well as `["a", "b", "c"]`
///
/// Environment overrides arrive as plain strings, TOML files usually carry arrays.
fn string_or_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: ListElement + Deserialize<'de>,
{
    struct ListVisitor<T>(PhantomData<T>);

    impl<'de, T> de::Visitor<'de> for ListVisitor<T>
    where
        T: ListElement + Deserialize<'de>,
    {
        type Value = Vec<T>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a comma-separated string or a list")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            T::parse_list(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            T::parse_list(&v.to_string()).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            T::parse_list(&v.to_string()).map_err(E::custom)
        }

        fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(item) = seq.next_element()? {
                items.push(item);
            }
            Ok(items)
        }
    }

    deserializer.deserialize_any(ListVisitor(PhantomData))
}
