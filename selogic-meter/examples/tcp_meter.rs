/// Simulated SELogic meter served over Modbus-TCP
use selogic_meter::simulator::{spawn_tcp_simulator, MeterModel, Simulator};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let mut model = MeterModel::default();
    let simulator = Simulator::new(&model);
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 5020);
    let state_update_period = Duration::from_millis(1000);

    let (addr, _server) = spawn_tcp_simulator(socket_addr, simulator.clone()).await?;
    println!("Simulated meter listening on {addr}");
    println!("Poll it with: cargo run -- --host 127.0.0.1 --port 5020 --interval 1");

    let mut tick = 0_u32;
    loop {
        tokio::time::sleep(state_update_period).await;
        tick = tick.wrapping_add(1);
        // slow drift of frequency and load around nominal values
        let phase = f32::from((tick % 60) as u16) / 60.0 * std::f32::consts::TAU;
        model.frequency = 50.0 + 0.05 * phase.sin();
        model.currents[0] = 12.5 + phase.cos();
        simulator.update(&model);
    }
}
