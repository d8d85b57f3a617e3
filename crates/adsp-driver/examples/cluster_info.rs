//! Bring the simulated cluster up and walk one core through its modes.

use std::sync::Arc;

use adsp_driver::{DspId, DspMode, DspRegistry, NopTransport, Result, SimBus};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("adsp_driver=debug")
        .init();

    let registry = DspRegistry::new(Arc::new(SimBus::new()), Arc::new(NopTransport), false);
    let client = registry.attach_client();

    println!("ADSP cluster\n");
    for raw in 0..8u8 {
        let id = DspId(raw);
        let resource = registry.lookup(id)?;
        println!(
            "  {}  family={:?}  mode={:?}  dpm={} MHz",
            id,
            resource.family(),
            registry.read_mode(id)?,
            resource.clock_rate() / 1_000_000,
        );
    }

    println!("\npower-cycling dsp0…");
    registry.set_mode(client, DspId(0), DspMode::Run)?;
    println!("  after RUN: {:?}", registry.read_mode(DspId(0))?);
    registry.set_mode(client, DspId(0), DspMode::Off)?;
    println!("  after OFF: {:?}", registry.read_mode(DspId(0))?);

    registry.detach_client(client)?;
    Ok(())
}
