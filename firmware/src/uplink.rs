//! Hand-off between the duty cycle and the radio stack.
//!
//! The duty cycle never waits on the radio. [`UplinkQueue`] pushes frames
//! into a bounded channel and drops them when it is full; the uplink task
//! drains the channel at its own pace.

use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;
use tracker_core::devices::UplinkTransport;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[cfg(target_os = "none")]
type UplinkMutex = CriticalSectionRawMutex;
#[cfg(not(target_os = "none"))]
type UplinkMutex = NoopRawMutex;

/// Largest application payload accepted at the slowest data rate.
pub const UPLINK_PAYLOAD_CAPACITY: usize = 51;

/// Frames buffered between the duty cycle and the uplink task.
pub const UPLINK_QUEUE_DEPTH: usize = 2;

/// One application payload with its delivery options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UplinkFrame {
    pub payload: Vec<u8, UPLINK_PAYLOAD_CAPACITY>,
    pub port: u8,
    pub confirmed: bool,
}

pub type UplinkChannel = Channel<UplinkMutex, UplinkFrame, UPLINK_QUEUE_DEPTH>;

pub type UplinkSender<'a> = Sender<'a, UplinkMutex, UplinkFrame, UPLINK_QUEUE_DEPTH>;

pub type UplinkReceiver<'a> = Receiver<'a, UplinkMutex, UplinkFrame, UPLINK_QUEUE_DEPTH>;

/// Non-blocking [`UplinkTransport`] feeding an [`UplinkChannel`].
pub struct UplinkQueue<'a> {
    sender: UplinkSender<'a>,
    dropped: u32,
}

impl<'a> UplinkQueue<'a> {
    pub const fn new(sender: UplinkSender<'a>) -> Self {
        Self { sender, dropped: 0 }
    }

    /// Frames discarded since boot.
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    fn drop_frame(&mut self, reason: &'static str) {
        self.dropped = self.dropped.saturating_add(1);
        crate::log::uplink_dropped(reason, self.dropped);
    }
}

impl UplinkTransport for UplinkQueue<'_> {
    fn send(&mut self, payload: &[u8], port: u8, confirmed: bool) {
        let Ok(payload) = Vec::from_slice(payload) else {
            self.drop_frame("oversize");
            return;
        };

        let frame = UplinkFrame {
            payload,
            port,
            confirmed,
        };
        if self.sender.try_send(frame).is_err() {
            self.drop_frame("queue full");
        }
    }
}

/// Takes frames off the queue forever, handing each to `deliver`.
pub async fn forward<F>(receiver: UplinkReceiver<'_>, mut deliver: F) -> !
where
    F: FnMut(UplinkFrame),
{
    loop {
        deliver(receiver.receive().await);
    }
}
