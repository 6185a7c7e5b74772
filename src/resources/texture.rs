use anyhow::Context as _;
use futures::FutureExt;
use futures_intrusive::channel::shared::{OneshotReceiver, OneshotSender, oneshot_channel};
use image::imageops::FilterType;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("page origin unavailable"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?
    };

    Ok(txt)
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.bytes().await?.to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?
    };

    Ok(data)
}

/// Multiply every colour channel by its alpha, rounding to nearest.
pub fn premultiply_alpha(image: &mut image::RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = u16::from(pixel[3]);
        for channel in &mut pixel.0[..3] {
            *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
        }
    }
}

/// Shrink `image` so neither side exceeds `max_dimension`, keeping its aspect ratio.
pub fn fit_within(image: image::RgbaImage, max_dimension: u32) -> image::RgbaImage {
    let (width, height) = image.dimensions();
    let max_dimension = max_dimension.max(1);
    if width <= max_dimension && height <= max_dimension {
        return image;
    }
    let scale = max_dimension as f64 / width.max(height) as f64;
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_dimension);
    log::warn!(
        "texture of {width}x{height} exceeds the device limit of {max_dimension}, \
         downscaling to {new_width}x{new_height}"
    );
    image::imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}

/// Successively halved copies of `image` down to 1x1, starting with `image` itself.
///
/// The image is expected to be premultiplied, so averaging texels is exact.
pub fn mip_chain(image: &image::RgbaImage) -> Vec<image::RgbaImage> {
    let mut levels = vec![image.clone()];
    loop {
        let Some(last) = levels.last() else { break };
        let (width, height) = last.dimensions();
        if (width <= 1 && height <= 1) || width == 0 || height == 0 {
            break;
        }
        let next = image::imageops::resize(
            last,
            (width / 2).max(1),
            (height / 2).max(1),
            FilterType::Triangle,
        );
        levels.push(next);
    }
    levels
}

/// Fetch and decode an image, returning premultiplied RGBA8.
pub async fn decode_texture(file_name: &str) -> anyhow::Result<image::RgbaImage> {
    let data = load_binary(file_name).await?;
    let mut rgba = image::load_from_memory(&data)
        .with_context(|| format!("cannot decode texture {file_name}"))?
        .to_rgba8();
    premultiply_alpha(&mut rgba);
    Ok(rgba)
}

pub type TextureResult = anyhow::Result<image::RgbaImage>;

/// Outcome of checking a [`PendingTexture`] without blocking.
#[derive(Debug)]
pub enum TexturePoll {
    Pending,
    Ready(image::RgbaImage),
    Failed(anyhow::Error),
}

/// Completes a [`PendingTexture`] from wherever the decode runs.
pub struct TextureSender(OneshotSender<TextureResult>);

impl TextureSender {
    pub fn send(self, result: TextureResult) {
        // The receiving mesh may already be gone, nothing to do then
        let _ = self.0.send(result);
    }
}

/// A texture decode that finishes some time after the mesh using it exists.
///
/// The result is only ever taken on the main tick via [`PendingTexture::poll`].
pub struct PendingTexture {
    label: String,
    receiver: OneshotReceiver<TextureResult>,
}

impl std::fmt::Debug for PendingTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTexture")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl PendingTexture {
    pub fn channel(label: &str) -> (TextureSender, PendingTexture) {
        let (sender, receiver) = oneshot_channel();
        (
            TextureSender(sender),
            PendingTexture {
                label: label.to_string(),
                receiver,
            },
        )
    }

    /// A pending texture that has already resolved.
    pub fn ready(label: &str, result: TextureResult) -> Self {
        let (sender, pending) = Self::channel(label);
        sender.send(result);
        pending
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn poll(&mut self) -> TexturePoll {
        match self.receiver.receive().now_or_never() {
            None => TexturePoll::Pending,
            Some(Some(Ok(image))) => TexturePoll::Ready(image),
            Some(Some(Err(e))) => TexturePoll::Failed(e),
            Some(None) => TexturePoll::Failed(anyhow::anyhow!(
                "texture task for {} ended without a result",
                self.label
            )),
        }
    }
}

/// Starts texture decodes in the background.
#[derive(Clone, Debug)]
pub struct TextureLoader {
    #[cfg(not(target_arch = "wasm32"))]
    runtime: tokio::runtime::Handle,
}

impl TextureLoader {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new() -> Self {
        Self {}
    }

    pub fn load(&self, file_name: &str) -> PendingTexture {
        let (sender, pending) = PendingTexture::channel(file_name);
        let file_name = file_name.to_string();
        let task = async move {
            sender.send(decode_texture(&file_name).await);
        };

        #[cfg(not(target_arch = "wasm32"))]
        self.runtime.spawn(task);

        #[cfg(target_arch = "wasm32")]
        wasm_bindgen_futures::spawn_local(task);

        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplies_colour_by_alpha() {
        let mut img = image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 128, 0, 128]));
        img.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));
        premultiply_alpha(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [128, 64, 0, 128]);
        assert_eq!(img.get_pixel(1, 0).0, [200, 100, 50, 255]);
    }

    #[test]
    fn fully_transparent_pixels_become_black() {
        let mut img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 0]));
        premultiply_alpha(&mut img);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn oversized_images_are_scaled_to_the_limit() {
        let wide = fit_within(image::RgbaImage::new(4096, 1024), 2048);
        assert_eq!(wide.dimensions(), (2048, 512));
        let tall = fit_within(image::RgbaImage::new(300, 5000), 2048);
        assert_eq!(tall.dimensions(), (123, 2048));
        let small = fit_within(image::RgbaImage::new(64, 32), 2048);
        assert_eq!(small.dimensions(), (64, 32));
    }

    #[test]
    fn mip_chain_halves_down_to_one_texel() {
        let base = image::RgbaImage::from_pixel(8, 2, image::Rgba([200, 100, 50, 255]));
        let sizes: Vec<(u32, u32)> = mip_chain(&base).iter().map(|l| l.dimensions()).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
        // A uniform image stays uniform at every level
        for level in mip_chain(&base) {
            let texel = level.get_pixel(0, 0).0;
            for (got, want) in texel.iter().zip([200u8, 100, 50, 255]) {
                assert!(got.abs_diff(want) <= 1, "{texel:?}");
            }
        }
        assert_eq!(mip_chain(&image::RgbaImage::new(1, 1)).len(), 1);
    }

    #[test]
    fn pending_texture_resolves_once_sent() {
        let (sender, mut pending) = PendingTexture::channel("cloud.png");
        assert!(matches!(pending.poll(), TexturePoll::Pending));
        assert!(matches!(pending.poll(), TexturePoll::Pending));
        sender.send(Ok(image::RgbaImage::new(2, 2)));
        match pending.poll() {
            TexturePoll::Ready(img) => assert_eq!(img.dimensions(), (2, 2)),
            other => panic!("expected a ready texture, got {other:?}"),
        }
    }

    #[test]
    fn dropped_sender_counts_as_failure() {
        let (sender, mut pending) = PendingTexture::channel("tree.png");
        drop(sender);
        assert!(matches!(pending.poll(), TexturePoll::Failed(_)));
    }

    #[test]
    fn missing_file_fails_to_decode() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let result = runtime.block_on(decode_texture("does/not/exist.png"));
        assert!(result.is_err());
    }
}
