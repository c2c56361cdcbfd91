use crate::hw::sleep::RtcSleep;
use crate::log::DefmtEventSink;
use crate::ticker::EmbassyTicker;

use super::TrackerOrchestrator;

#[embassy_executor::task]
pub async fn run(orchestrator: TrackerOrchestrator, mut sleep: RtcSleep) -> ! {
    let mut ticker = EmbassyTicker::start(orchestrator.config().tick_period());
    orchestrator
        .run(&mut ticker, &mut sleep, &mut DefmtEventSink)
        .await
}
