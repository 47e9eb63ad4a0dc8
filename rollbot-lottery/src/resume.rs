use crate::bridge::WebAnnouncer;
use crate::scheduler::Scheduler;
use crate::Result;
use chrono::{DateTime, Utc};
use rollbot_core::EventStore;

/// Re-arm every pending event of the monitored groups. Must run before the
/// dispatcher accepts new lotteries. Returns how many events were armed.
///
/// Web events inserted while nothing watched the change feed are announced
/// first, so they can still collect opt-ins before their draw.
pub async fn resume(
    scheduler: &Scheduler,
    announcer: &WebAnnouncer,
    store: &dyn EventStore,
    groups: &[i64],
    now: DateTime<Utc>,
) -> Result<usize> {
    let mut armed = 0;
    for &group_id in groups {
        let pending = store.find_pending(group_id, now).await?;
        tracing::info!("Resuming {} pending rolls in group {}", pending.len(), group_id);

        for mut event in pending {
            if WebAnnouncer::needs_announcement(&event) && !scheduler.is_armed(&event.short_id()) {
                tracing::info!("Announcing web roll {} missed while offline", event.id);
                announcer.announce(&mut event).await;
            }
            if scheduler.arm(event).is_some() {
                armed += 1;
            }
        }
    }
    Ok(armed)
}
