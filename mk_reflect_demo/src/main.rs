use anyhow::Context;
use log::info;
use mk_reflect::emit::{emit_cpp_header, emit_summary};
use mk_reflect_demo::{demo_ir, demo_reflection, DemoVertex, Material};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let reflection = demo_reflection().context("reflecting DemoVertex/Material")?;
    print!("{}", emit_summary(&reflection));

    println!("\n== Header ==");
    print!("{}", emit_cpp_header(&demo_ir(), None));

    let v = DemoVertex { pos: [0.0, 1.0, 2.0], normal: [0.0, 0.0, 1.0], uv: [0.5, 0.25] };
    let layout = reflection.vertex_layout("DemoVertex").context("DemoVertex has no vertex layout")?;
    info!("DemoVertex stride={} (size_of={})", layout.layout.size, std::mem::size_of::<DemoVertex>());
    info!("sample vertex {:?}, material {:?}", v, Material { id: 7 });
    Ok(())
}
