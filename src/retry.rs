/// Bounded retry for messages to extension pages and content scripts
use crate::error::{Error, Result};
use crate::host::{Tabs, Timers};
use serde_json::Value;

/// Send `message` to a tab, retrying up to `attempts` times with a fixed
/// delay. Returns the attempt that succeeded.
pub async fn send_with_retry<H: Tabs + Timers>(
    host: &H,
    tab_id: i32,
    message: &Value,
    attempts: u32,
    delay_ms: u32,
) -> Result<u32> {
    let attempts = attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        match host.send_message(tab_id, message).await {
            Ok(()) => return Ok(attempt),
            Err(e) => {
                log::debug!("Message to tab {} failed (attempt {}/{}): {}", tab_id, attempt, attempts, e);
                last = e.to_string();
                if attempt < attempts {
                    host.sleep(delay_ms).await;
                }
            }
        }
    }

    Err(Error::Messaging { attempts, last })
}
