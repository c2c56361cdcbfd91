use crate::log;
use crate::uplink::{self, UplinkReceiver};

/// Drains queued frames toward the radio stack.
#[embassy_executor::task]
pub async fn run(receiver: UplinkReceiver<'static>) -> ! {
    uplink::forward(receiver, |frame| log::uplink_frame(&frame)).await
}
