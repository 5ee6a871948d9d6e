use clap::Parser;

use vcmtrace::config::Cli;
use vcmtrace::demo_scenes;
use vcmtrace::driver;
use vcmtrace::image::to_srgb_image;

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.to_config();

    let scene = match demo_scenes::by_name(&cli.scene, cli.width, cli.height) {
        Ok(scene) => scene,
        Err(err) => {
            log::error!("failed to load scene '{}': {err}", cli.scene);
            std::process::exit(1);
        }
    };

    let pixels = driver::render(std::sync::Arc::new(scene), config, cli.variant, None);
    let img = to_srgb_image(cli.width, cli.height, &pixels);

    if let Err(err) = img.save(&cli.output) {
        log::error!("failed to write output image '{}': {err}", cli.output);
        std::process::exit(1);
    }

    log::info!("wrote {}", cli.output);
}
