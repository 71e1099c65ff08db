use argh::FromArgs;

use panokit::cp::finetune::{fine_tune_control_point, FineTuneOptions};
use panokit::cp::mask::{MaskKind, MaskPolygon};
use panokit::cp::{clean, ControlPoint, PanoImage, Panorama};
use panokit::image::{Image, ImageSize};
use panokit::imgproc::finetune::RotationSearch;
use panokit::imgproc::patch::ImageCache;

#[derive(FromArgs)]
/// Refine the control points of a synthetic image pair and drop the masked ones
struct Args {
    /// horizontal displacement of the second image in pixels
    #[argh(option, default = "3.5")]
    dx: f64,

    /// vertical displacement of the second image in pixels
    #[argh(option, default = "-2.25")]
    dy: f64,

    /// side of the correlation template in pixels
    #[argh(option, default = "21")]
    template_size: usize,

    /// also search rotations of the template
    #[argh(switch)]
    rotation: bool,
}

const SIZE: usize = 160;

fn texture(x: f64, y: f64) -> u8 {
    let v = 128.0
        + 60.0 * (x / 7.0).sin() * (y / 11.0).cos()
        + 40.0 * ((x + 2.0 * y) / 13.0).sin();
    v.clamp(0.0, 255.0) as u8
}

fn render(dx: f64, dy: f64) -> Result<Image<u8, 3>, Box<dyn std::error::Error>> {
    let size = ImageSize {
        width: SIZE,
        height: SIZE,
    };
    let data = (0..size.area())
        .flat_map(|i| {
            let v = texture((i % SIZE) as f64 - dx, (i / SIZE) as f64 - dy);
            [v, v, v]
        })
        .collect();
    Ok(Image::new(size, data)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    // the second image shows the first one moved by (dx, dy)
    let mut cache = ImageCache::new();
    cache.insert(&render(0.0, 0.0)?)?;
    cache.insert(&render(args.dx, args.dy)?)?;

    let mut pano = Panorama::default();
    for _ in 0..2 {
        pano.add_image(PanoImage::new(cache.get(0)?.size(), 50.0));
    }
    pano.images_mut()[1].masks.push(MaskPolygon::new(
        MaskKind::Negative,
        vec![[0.0, 0.0], [40.0, 0.0], [40.0, 40.0], [0.0, 40.0]],
    ));

    // rough guesses, as a feature matcher would deliver them
    for &(x, y) in &[(30.0, 30.0), (80.0, 60.0), (120.0, 110.0), (60.0, 130.0)] {
        pano.add_control_point(ControlPoint::new(0, [x, y], 1, [x + 1.0, y - 1.0]))?;
    }

    let options = FineTuneOptions {
        template_size: args.template_size,
        rotation: args.rotation.then(RotationSearch::default),
        ..Default::default()
    };

    let mut refined = Vec::with_capacity(pano.control_points().len());
    for cp in pano.control_points() {
        let outcome = fine_tune_control_point(&cache, cp, &options)?;
        println!(
            "{:?} -> {:?} score {:.3} angle {:.1} {}",
            cp.point_b,
            outcome.point.point_b,
            outcome.result.score,
            outcome.result.angle,
            if outcome.accepted { "accepted" } else { "rejected" }
        );
        refined.push(outcome.point);
    }
    pano.set_control_points(refined)?;

    let masked = clean::cp_in_masks(&pano);
    let removed = pano.remove_control_points(&masked);
    log::info!("removed {removed} masked control points");
    println!("{} control points left", pano.control_points().len());

    Ok(())
}
