//! Halt a core, poke its registers through the debug port, set a breakpoint,
//! and catch a simulated hit.

use std::sync::Arc;
use std::time::Duration;

use adsp_driver::{DspId, DspMode, DspRegistry, NopTransport, Result, SimBus};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("adsp_driver=debug")
        .init();

    let bus = Arc::new(SimBus::new());
    let registry = DspRegistry::new(bus.clone(), Arc::new(NopTransport), false);
    let client = registry.attach_client();
    let dsp = registry.acquire_resource(client, DspId(6))?;

    dsp.set_mode(DspMode::Run)?;
    dsp.set_mode(DspMode::Pause)?;

    dsp.set_ar(2, 0x1234_5678)?;
    println!("ar2 = {:#010x}", dsp.get_ar(2)?);

    let addr = 0x4000_2000;
    dsp.set_breakpoint(0, addr)?;
    dsp.set_mode(DspMode::ExitOcd)?;

    bus.inject_breakpoint_hit(DspId(6), addr);
    dsp.wait_breakpoint(Duration::from_millis(100))?;
    println!("breakpoint at {addr:#x} hit");

    dsp.set_mode(DspMode::Off)?;
    registry.detach_client(client)?;
    Ok(())
}
