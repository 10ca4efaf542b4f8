use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use futures::future;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_modbus::server;
use tokio_modbus::{Exception, Request, Response};
use tracing::{debug, warn};

use crate::codec::{encode_text, Address, Encode, Quantity, Word, WordOrder};
use crate::register_map::MeterBlock;

#[derive(Debug, Clone, Default)]
/// A raw Modbus holding registers representation
pub struct Registers(HashMap<Address, Word>);

impl Registers {
    /// Insert new consecutive registers with `words` values starting at `addr` address.
    pub fn insert(&mut self, addr: Address, words: Vec<Word>) {
        for (i, value) in words.into_iter().enumerate() {
            let reg_addr = addr + i as Address;
            self.0.insert(reg_addr, value);
        }
    }

    /// Remove `cnt` consecutive registers starting at `addr`.
    pub fn remove(&mut self, addr: Address, cnt: Quantity) {
        for i in 0..cnt {
            self.0.remove(&(addr + i));
        }
    }

    /// Read `cnt` consecutive registers starting at `addr`.
    pub fn read(&self, addr: Address, cnt: Quantity) -> Result<Vec<Word>, Exception> {
        (0..cnt)
            .map(|i| {
                let reg_addr = addr.wrapping_add(i);
                self.0.get(&reg_addr).copied().ok_or_else(|| {
                    debug!("SERVER: Exception::IllegalDataAddress at {}", reg_addr);
                    Exception::IllegalDataAddress
                })
            })
            .collect()
    }
}

/// Simulated meter readings, stored the way the meter encodes them.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterModel {
    pub model: String,
    pub manufacturer: String,
    /// Uab, Ubc, Uca
    pub line_voltages: [f32; 3],
    /// Ua, Ub, Uc
    pub phase_voltages: [f32; 3],
    /// Ia, Ib, Ic, In
    pub currents: [f32; 4],
    /// Raw power factor registers in `[-2, 2]`: PFa, PFb, PFc, PF
    pub power_factors: [f32; 4],
    pub frequency: f32,
    pub word_order: WordOrder,
}

impl Default for MeterModel {
    fn default() -> Self {
        Self {
            model: "PM5560".to_string(),
            manufacturer: "Schneider Electric".to_string(),
            line_voltages: [400.5, 401.25, 399.75],
            phase_voltages: [230.5, 231.0, 229.5],
            currents: [12.5, 11.75, 13.0, 0.25],
            power_factors: [0.95, -1.5, 1.25, 0.5],
            frequency: 50.0,
            word_order: WordOrder::Big,
        }
    }
}

impl MeterModel {
    /// Holding registers exposing this model.
    pub fn registers(&self) -> Registers {
        let mut registers = Registers::default();
        let floats = |values: &[f32]| -> Vec<Word> {
            values
                .iter()
                .flat_map(|v| v.to_words(self.word_order))
                .collect()
        };

        let count = |block: MeterBlock| usize::from(block.count());
        registers.insert(
            MeterBlock::Model.address(),
            encode_text(&self.model, count(MeterBlock::Model)),
        );
        registers.insert(
            MeterBlock::Manufacturer.address(),
            encode_text(&self.manufacturer, count(MeterBlock::Manufacturer)),
        );

        let [uab, ubc, uca] = self.line_voltages;
        let [ua, ub, uc] = self.phase_voltages;
        registers.insert(
            MeterBlock::Voltages.address(),
            floats(&[uab, ubc, uca, 0.0, ua, ub, uc]),
        );
        registers.insert(MeterBlock::Currents.address(), floats(&self.currents));
        registers.insert(
            MeterBlock::PowerFactors.address(),
            floats(&self.power_factors),
        );
        registers.insert(MeterBlock::Frequency.address(), floats(&[self.frequency]));

        registers
    }
}

#[derive(Debug, Clone)]
/// Modbus server side of a simulated meter. Clones share the same registers.
pub struct Simulator(Arc<Mutex<Registers>>);

impl Simulator {
    pub fn new(model: &MeterModel) -> Self {
        Self(Arc::new(Mutex::new(model.registers())))
    }

    /// Replace all registers with the content of `model`.
    pub fn update(&self, model: &MeterModel) {
        *self.registers() = model.registers();
    }

    /// Make a block unreadable, so requests for it fail with an exception.
    pub fn remove_block(&self, block: MeterBlock) {
        self.registers().remove(block.address(), block.count());
    }

    fn registers(&self) -> std::sync::MutexGuard<'_, Registers> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl tokio_modbus::server::Service for Simulator {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = Exception;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        match req {
            Request::ReadHoldingRegisters(addr, cnt) => future::ready(
                self.registers()
                    .read(addr, cnt)
                    .map(Response::ReadHoldingRegisters),
            ),
            _ => {
                debug!("SERVER: Exception::IllegalFunction - unimplemented function code in request: {req:?}");
                future::ready(Err(Exception::IllegalFunction))
            }
        }
    }
}

async fn run_tcp_server_context(listener: TcpListener, simulator: Simulator) {
    let server = server::tcp::Server::new(listener);
    let new_service = |_socket_addr| Ok(Some(simulator.clone()));
    let on_connected = |stream, socket_addr| async move {
        server::tcp::accept_tcp_connection(stream, socket_addr, new_service)
    };
    let on_process_error = |err| {
        warn!("Simulator connection error: {}", err);
    };
    if let Err(err) = server.serve(&on_connected, on_process_error).await {
        warn!("Simulator stopped: {}", err);
    }
}

/// Bind `socket_addr` and serve the simulator forever.
///
/// Returns the bound address, which differs from `socket_addr` when port 0 is requested.
pub async fn spawn_tcp_simulator(
    socket_addr: SocketAddr,
    simulator: Simulator,
) -> Result<(SocketAddr, JoinHandle<()>), std::io::Error> {
    let listener = TcpListener::bind(socket_addr).await?;
    let local_addr = listener.local_addr()?;
    let handle = tokio::spawn(run_tcp_server_context(listener, simulator));
    Ok((local_addr, handle))
}
