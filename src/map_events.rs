//! Events from the map component
//!
//! The binary reads them as JSON lines, for example
//!
//! ```text
//! {"type":"viewportSettled","viewport":{"center":{"lon":2.95,"lat":40.75},"zoom":13,
//!  "bounds":{"ne":{"lon":3.1,"lat":40.9},"sw":{"lon":2.8,"lat":40.6}}}}
//! {"type":"ageChanged","minutes":10}
//! ```

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::AisViewerError;
use crate::viewport::Viewport;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MapEvent {
    /// A pan or zoom gesture has finished
    ViewportSettled { viewport: Viewport },
    /// The user picked a new maximum data age
    AgeChanged { minutes: u8 },
}

/// Forward map events read line by line until EOF or until the receiver is
/// dropped. Malformed lines are logged and skipped.
pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<MapEvent>) -> Result<(), AisViewerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<MapEvent>(line) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Ignoring malformed map event: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::{BoundingBox, LonLat};

    #[tokio::test]
    async fn forward_valid_lines_and_skip_garbage() {
        let input = concat!(
            r#"{"type":"viewportSettled","viewport":{"center":{"lon":2.95,"lat":40.75},"zoom":13,"#,
            r#""bounds":{"ne":{"lon":3.1,"lat":40.9},"sw":{"lon":2.8,"lat":40.6}}}}"#,
            "\n",
            "\n",
            "not an event\n",
            r#"{"type":"ageChanged","minutes":10}"#,
            "\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        forward_lines(input.as_bytes(), tx).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            MapEvent::ViewportSettled {
                viewport: Viewport {
                    center: LonLat {
                        lon: 2.95,
                        lat: 40.75
                    },
                    zoom: 13.0,
                    bounds: BoundingBox {
                        ne: LonLat { lon: 3.1, lat: 40.9 },
                        sw: LonLat { lon: 2.8, lat: 40.6 },
                    },
                },
            }
        );
        assert_eq!(rx.recv().await.unwrap(), MapEvent::AgeChanged { minutes: 10 });
        // Sender dropped after EOF
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn stop_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let input = "{\"type\":\"ageChanged\",\"minutes\":5}\n";
        assert!(forward_lines(input.as_bytes(), tx).await.is_ok());
    }
}
