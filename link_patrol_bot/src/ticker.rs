use std::{future::Future, time::Duration};

use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// Run `job` every `period`, starting one period from now, until `shutdown`
/// turns true or its sender goes away.
///
/// A run of `job` is never interrupted. If it runs longer than `period`, the
/// next one starts a full period after it ends instead of piling up.
pub async fn run_every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let stopping = *shutdown.borrow_and_update();
        if stopping {
            break;
        }

        tokio::select! {
            _ = interval.tick() => job().await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Nobody left to tell us to stop, so stop now.
                    break;
                }
            }
        }
    }

    log::debug!("Periodic job stopped");
}
