//! Livereload wire messages.
//!
//! Messages are JSON text frames following the livereload.com handshake:
//! the client opens with a hello, the server answers with the protocol
//! revisions it speaks, and every file change afterwards becomes a reload
//! command.

use serde::{Deserialize, Serialize};

/// The protocol revision this server advertises.
pub(crate) const PROTOCOL_V7: &str = "http://livereload.com/protocols/official-7";

/// Server name included in the hello reply.
pub(crate) const SERVER_NAME: &str = "lrd";

/// Messages sent to connected clients.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "lowercase")]
pub(crate) enum ServerMessage {
    /// Handshake reply.
    Hello {
        protocols: Vec<String>,
        #[serde(rename = "serverName")]
        server_name: String,
    },
    /// Instruct the client to reload `path`.
    Reload {
        path: String,
        #[serde(rename = "liveCSS")]
        live_css: bool,
    },
}

impl ServerMessage {
    pub(crate) fn hello() -> Self {
        Self::Hello {
            protocols: vec![PROTOCOL_V7.to_owned()],
            server_name: SERVER_NAME.to_owned(),
        }
    }

    pub(crate) fn reload(path: impl Into<String>) -> Self {
        Self::Reload {
            path: path.into(),
            live_css: true,
        }
    }
}

/// A message received from a client.
///
/// The handshake only requires the first frame to decode as a JSON object;
/// fields beyond the command name are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ClientMessage {
    #[serde(default)]
    pub(crate) command: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn hello_serializes_with_protocol_list() {
        let json = serde_json::to_value(ServerMessage::hello()).unwrap();

        assert_eq!(json["command"], "hello");
        assert_eq!(json["protocols"][0], PROTOCOL_V7);
        assert_eq!(json["serverName"], "lrd");
    }

    #[test]
    fn reload_serializes_with_live_css_flag() {
        let json = serde_json::to_value(ServerMessage::reload("css/site.css")).unwrap();

        assert_eq!(json["command"], "reload");
        assert_eq!(json["path"], "css/site.css");
        assert_eq!(json["liveCSS"], true);
    }

    #[test]
    fn client_hello_decodes() {
        let message: ClientMessage = serde_json::from_str(
            r#"{"command":"hello","protocols":["http://livereload.com/protocols/official-7"]}"#,
        )
        .unwrap();

        assert_eq!(message.command, "hello");
    }

    #[test]
    fn client_message_without_command_decodes() {
        let message: ClientMessage = serde_json::from_str("{}").unwrap();

        assert_eq!(message.command, "");
    }

    #[test]
    fn client_message_must_be_an_object() {
        assert!(serde_json::from_str::<ClientMessage>("[1,2,3]").is_err());
        assert!(serde_json::from_str::<ClientMessage>("not json").is_err());
    }
}
