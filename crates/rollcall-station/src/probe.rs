//! Reader probe: reports what the reader sees, with no directory access.

use std::future::Future;

use rollcall_hardware::{HardwareError, IndicatorLight, LightDriver, TagReader};
use serde::Serialize;
use tracing::info;

use crate::signal::Signal;
use crate::tag::{StudentId, TagFormatError};

/// One tag seen by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReading {
    /// Payload as read.
    pub payload: String,
    /// Student number, when the payload is a valid student tag.
    pub student_id: Option<StudentId>,
    /// Why the payload is not a student tag.
    pub rejection: Option<TagFormatError>,
}

impl ProbeReading {
    fn new(payload: String) -> Self {
        match StudentId::from_payload(&payload) {
            Ok(id) => Self {
                payload,
                student_id: Some(id),
                rejection: None,
            },
            Err(reason) => Self {
                payload,
                student_id: None,
                rejection: Some(reason),
            },
        }
    }
}

/// Runs the self-test, then reports every tag until `shutdown` resolves or
/// the reader closes. The indicator shows red while waiting for a tag.
///
/// Returns the number of tags reported.
///
/// # Errors
///
/// Returns an error if the indicator or the reader fails.
pub async fn probe_until<L, R, F>(
    mut light: IndicatorLight<L>,
    reader: &mut R,
    shutdown: F,
    mut report: impl FnMut(&ProbeReading),
) -> Result<usize, HardwareError>
where
    L: LightDriver,
    R: TagReader + ?Sized,
    F: Future<Output = ()>,
{
    let result = async {
        light.self_test().await?;
        tokio::pin!(shutdown);
        let mut seen = 0;

        loop {
            Signal::Armed.show(&mut light).await?;
            let tag = tokio::select! {
                biased;
                () = &mut shutdown => break,
                tag = reader.read_tag() => tag?,
            };
            let Some(tag) = tag else {
                break;
            };

            Signal::Invalid.show(&mut light).await?;
            let reading = ProbeReading::new(tag.into_inner());
            seen += 1;
            report(&reading);
        }

        Ok::<usize, HardwareError>(seen)
    }
    .await;

    let released = light.release();
    let seen = result?;
    released?;
    info!(tags = seen, "Probe stopped");
    Ok(seen)
}
