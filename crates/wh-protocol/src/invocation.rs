//! Invocation request model
//!
//! An invocation names a module (by file path, inline text, stream or cache
//! key), an optional export, and the arguments to call it with. On the wire
//! the request is a camelCase JSON object. Stream-sourced modules follow the
//! JSON after [`MODULE_BOUNDARY`].

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tokio::io::AsyncRead;

use crate::error::ProtocolError;

/// Separates the JSON request from the raw module bytes of a stream source
pub const MODULE_BOUNDARY: &[u8] = b"--Uninvoked_Module--";

/// Readable module source, consumed exactly once
pub type ModuleStream = Box<dyn AsyncRead + Send + Unpin>;

/// Where the worker loads the module from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleSourceType {
    File = 0,
    String = 1,
    Stream = 2,
    Cache = 3,
}

impl Serialize for ModuleSourceType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

/// Module reference for one invocation
pub enum ModuleSource {
    /// Path the worker resolves against its project directory
    File { path: String },
    /// Inline module text
    String {
        text: String,
        new_cache_identifier: Option<String>,
    },
    /// Module text read from a stream
    Stream {
        stream: ModuleStream,
        new_cache_identifier: Option<String>,
    },
    /// Module previously cached by the worker
    Cache { cache_identifier: String },
}

impl ModuleSource {
    /// Wire discriminant
    pub fn source_type(&self) -> ModuleSourceType {
        match self {
            ModuleSource::File { .. } => ModuleSourceType::File,
            ModuleSource::String { .. } => ModuleSourceType::String,
            ModuleSource::Stream { .. } => ModuleSourceType::Stream,
            ModuleSource::Cache { .. } => ModuleSourceType::Cache,
        }
    }

    /// Identifier sent as `moduleSource` (none for streams)
    pub fn module_source(&self) -> Option<&str> {
        match self {
            ModuleSource::File { path } => Some(path),
            ModuleSource::String { text, .. } => Some(text),
            ModuleSource::Stream { .. } => None,
            ModuleSource::Cache { cache_identifier } => Some(cache_identifier),
        }
    }

    /// Key the worker should cache a String or Stream module under
    pub fn new_cache_identifier(&self) -> Option<&str> {
        match self {
            ModuleSource::String {
                new_cache_identifier,
                ..
            }
            | ModuleSource::Stream {
                new_cache_identifier,
                ..
            } => new_cache_identifier.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::File { path } => f.debug_struct("File").field("path", path).finish(),
            ModuleSource::String {
                text,
                new_cache_identifier,
            } => f
                .debug_struct("String")
                .field("len", &text.len())
                .field("new_cache_identifier", new_cache_identifier)
                .finish(),
            ModuleSource::Stream {
                new_cache_identifier,
                ..
            } => f
                .debug_struct("Stream")
                .field("new_cache_identifier", new_cache_identifier)
                .finish_non_exhaustive(),
            ModuleSource::Cache { cache_identifier } => f
                .debug_struct("Cache")
                .field("cache_identifier", cache_identifier)
                .finish(),
        }
    }
}

/// One RPC call to the worker
#[derive(Debug)]
pub struct InvocationRequest {
    /// Module to load
    pub source: ModuleSource,
    /// Export to call, or the module's default export when absent
    pub export_name: Option<String>,
    /// Positional arguments
    pub args: Vec<Value>,
}

/// JSON head of an invocation request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestHeader<'a> {
    module_source_type: ModuleSourceType,
    module_source: Option<&'a str>,
    new_cache_identifier: Option<&'a str>,
    export_name: Option<&'a str>,
    args: &'a [Value],
}

impl InvocationRequest {
    /// Create a request for the default export with no arguments
    pub fn new(source: ModuleSource) -> Self {
        Self {
            source,
            export_name: None,
            args: Vec::new(),
        }
    }

    /// Invoke a module file
    pub fn from_file(path: impl Into<String>) -> Self {
        Self::new(ModuleSource::File { path: path.into() })
    }

    /// Invoke inline module text
    pub fn from_string(text: impl Into<String>, new_cache_identifier: Option<String>) -> Self {
        Self::new(ModuleSource::String {
            text: text.into(),
            new_cache_identifier,
        })
    }

    /// Invoke module text read from a stream
    pub fn from_stream(stream: ModuleStream, new_cache_identifier: Option<String>) -> Self {
        Self::new(ModuleSource::Stream {
            stream,
            new_cache_identifier,
        })
    }

    /// Invoke a module the worker has cached
    pub fn from_cache(cache_identifier: impl Into<String>) -> Self {
        Self::new(ModuleSource::Cache {
            cache_identifier: cache_identifier.into(),
        })
    }

    /// Set the export to call
    pub fn with_export(mut self, export_name: Option<String>) -> Self {
        self.export_name = export_name;
        self
    }

    /// Set the call arguments
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Wire discriminant of the module source
    pub fn source_type(&self) -> ModuleSourceType {
        self.source.source_type()
    }

    /// Copy the request for another attempt
    ///
    /// Returns `None` for stream sources, which can only be sent once.
    pub fn try_clone(&self) -> Option<Self> {
        let source = match &self.source {
            ModuleSource::File { path } => ModuleSource::File { path: path.clone() },
            ModuleSource::String {
                text,
                new_cache_identifier,
            } => ModuleSource::String {
                text: text.clone(),
                new_cache_identifier: new_cache_identifier.clone(),
            },
            ModuleSource::Stream { .. } => return None,
            ModuleSource::Cache { cache_identifier } => ModuleSource::Cache {
                cache_identifier: cache_identifier.clone(),
            },
        };

        Some(Self {
            source,
            export_name: self.export_name.clone(),
            args: self.args.clone(),
        })
    }

    /// Serialize the JSON head of the request
    pub fn header_json(&self) -> Result<Vec<u8>, ProtocolError> {
        let header = RequestHeader {
            module_source_type: self.source.source_type(),
            module_source: self.source.module_source(),
            new_cache_identifier: self.source.new_cache_identifier(),
            export_name: self.export_name.as_deref(),
            args: &self.args,
        };
        Ok(serde_json::to_vec(&header)?)
    }

    /// Split into the JSON head and, for stream sources, the module stream
    pub fn into_parts(self) -> Result<(Vec<u8>, Option<ModuleStream>), ProtocolError> {
        let header = self.header_json()?;
        let stream = match self.source {
            ModuleSource::Stream { stream, .. } => Some(stream),
            _ => None,
        };
        Ok((header, stream))
    }
}

/// Error body the worker returns with a server-error status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationErrorPayload {
    pub error_message: String,
    #[serde(default)]
    pub error_stack: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn header(request: &InvocationRequest) -> Value {
        serde_json::from_slice(&request.header_json().unwrap()).unwrap()
    }

    #[test]
    fn test_file_request_json() {
        let request = InvocationRequest::from_file("./add.js")
            .with_export(Some("add".to_string()))
            .with_args(vec![json!(1), json!(2)]);

        assert_eq!(
            header(&request),
            json!({
                "moduleSourceType": 0,
                "moduleSource": "./add.js",
                "newCacheIdentifier": null,
                "exportName": "add",
                "args": [1, 2],
            })
        );
    }

    #[test]
    fn test_string_request_carries_cache_identifier() {
        let request =
            InvocationRequest::from_string("module.exports = () => 1", Some("one".to_string()));
        let value = header(&request);

        assert_eq!(value["moduleSourceType"], 1);
        assert_eq!(value["newCacheIdentifier"], "one");
        assert_eq!(value["exportName"], Value::Null);
    }

    #[test]
    fn test_stream_request_omits_module_source() {
        let stream: ModuleStream = Box::new(&b"module.exports = 1"[..]);
        let request = InvocationRequest::from_stream(stream, Some("key".to_string()));
        let value = header(&request);

        assert_eq!(value["moduleSourceType"], 2);
        assert_eq!(value["moduleSource"], Value::Null);
        assert_eq!(value["newCacheIdentifier"], "key");

        let (_, stream) = request.into_parts().unwrap();
        assert!(stream.is_some());
    }

    #[test]
    fn test_cache_request_ignores_new_cache_identifier() {
        let request = InvocationRequest::from_cache("cached");
        let value = header(&request);

        assert_eq!(value["moduleSourceType"], 3);
        assert_eq!(value["moduleSource"], "cached");
        assert_eq!(value["newCacheIdentifier"], Value::Null);
    }

    #[test]
    fn test_try_clone() {
        let request = InvocationRequest::from_cache("c").with_args(vec![json!("x")]);
        let copy = request.try_clone().unwrap();
        assert_eq!(copy.args, request.args);
        assert_eq!(copy.source_type(), ModuleSourceType::Cache);

        let stream: ModuleStream = Box::new(&b""[..]);
        assert!(InvocationRequest::from_stream(stream, None).try_clone().is_none());
    }

    #[test]
    fn test_error_payload_without_stack() {
        let payload: InvocationErrorPayload =
            serde_json::from_str(r#"{"errorMessage":"boom"}"#).unwrap();
        assert_eq!(payload.error_message, "boom");
        assert_eq!(payload.error_stack, None);
    }
}
