//! Polls a simulated meter over a real Modbus-TCP session.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use selogic_meter::error::{PollError, ReadError};
use selogic_meter::poller::{MeterPoller, PollerSettings};
use selogic_meter::register_map::MeterBlock;
use selogic_meter::simulator::{spawn_tcp_simulator, MeterModel, Simulator};
use selogic_meter::snapshot::MetricKey;
use selogic_meter::transport::TcpTransport;

async fn start(model: &MeterModel) -> (Simulator, MeterPoller<TcpTransport>) {
    let simulator = Simulator::new(model);
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
    let (addr, _server) = spawn_tcp_simulator(socket_addr, simulator.clone())
        .await
        .unwrap();

    let transport = TcpTransport::new(addr.ip().to_string(), addr.port(), Duration::from_secs(2));
    let settings = PollerSettings {
        request_timeout: Duration::from_secs(2),
        ..PollerSettings::default()
    };
    (simulator, MeterPoller::new(transport, settings))
}

#[tokio::test]
async fn polls_simulated_meter() {
    let model = MeterModel::default();
    let (simulator, mut poller) = start(&model).await;
    let handle = poller.handle();

    poller.poll_cycle().await.unwrap();

    let identity = handle.identity().unwrap();
    assert_eq!(identity.model, "PM5560");
    assert_eq!(identity.manufacturer, "Schneider Electric");

    assert_eq!(handle.value(MetricKey::Uab), Some(400.5));
    assert_eq!(handle.value(MetricKey::Uc), Some(229.5));
    assert_eq!(handle.value(MetricKey::In), Some(0.25));
    assert_eq!(handle.value(MetricKey::PFb), Some(-50.0));
    assert_eq!(handle.value(MetricKey::PFc), Some(75.0));
    assert_eq!(handle.value(MetricKey::Freq), Some(50.0));

    // new readings show up on the next cycle over a fresh session
    simulator.update(&MeterModel {
        frequency: 60.0,
        ..model
    });
    poller.poll_cycle().await.unwrap();
    assert_eq!(handle.value(MetricKey::Freq), Some(60.0));
}

#[tokio::test]
async fn exception_response_aborts_cycle() {
    let (simulator, mut poller) = start(&MeterModel::default()).await;
    let handle = poller.handle();

    poller.poll_cycle().await.unwrap();
    let previous = handle.snapshot().unwrap();

    simulator.remove_block(MeterBlock::Currents);
    let err = poller.poll_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        PollError::Read {
            block: MeterBlock::Currents,
            source: ReadError::ProtocolError(_)
        }
    ));
    assert_eq!(handle.snapshot().unwrap(), previous);
}
