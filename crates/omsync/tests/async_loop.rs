//! Endpoints driven by the tokio loop on separate tasks.

mod common;

use std::time::Duration;

use omsync::core::Role;
use omsync::sync::{LinkHandle, MemoryLink};
use omsync::{Endpoint, EndpointEvent};
use tokio::sync::watch;

use common::{init_tracing, lights};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_until_shutdown() -> anyhow::Result<()> {
    init_tracing();
    let (a, b) = (LinkHandle::new(), LinkHandle::new());
    let (wire_a, wire_b) = MemoryLink::pair(a.clone(), b.clone());
    wire_a.set_auto_deliver(true);

    let mut device = Endpoint::builder(Role::Device, lights()).build(a, wire_a)?;
    let mut controller = Endpoint::builder(Role::Controller, lights()).build(b, wire_b)?;
    controller.command("=lt321")?;
    device.command("=sv8")?;

    let (stop, shutdown) = watch::channel(false);
    let period = Duration::from_millis(5);

    let device_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            device.run(period, shutdown).await;
            device
        }
    });
    let controller_task = tokio::spawn(async move {
        let mut events = Vec::new();
        controller
            .run_with(period, shutdown, |e| events.push(e))
            .await;
        (controller, events)
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    stop.send(true)?;

    let device = device_task.await?;
    let (controller, events) = controller_task.await?;

    assert_eq!(device.root().property("lt").and_then(|p| p.as_long()), Some(321));
    assert_eq!(controller.root().property("sv").and_then(|p| p.as_long()), Some(8));
    assert!(events.iter().any(|e| matches!(e, EndpointEvent::Connected)));
    Ok(())
}

#[tokio::test]
async fn test_run_stops_when_sender_dropped() -> anyhow::Result<()> {
    init_tracing();
    let (a, b) = (LinkHandle::new(), LinkHandle::new());
    let (wire_a, _wire_b) = MemoryLink::pair(a.clone(), b);
    let mut device = Endpoint::builder(Role::Device, lights()).build(a, wire_a)?;

    let (stop, shutdown) = watch::channel(false);
    drop(stop);
    tokio::time::timeout(
        Duration::from_secs(1),
        device.run(Duration::from_millis(5), shutdown),
    )
    .await?;
    Ok(())
}
