//! Sanity image URLs.
//!
//! Images are served and transformed by the Sanity CDN: this only computes URLs, no image
//! is ever downloaded. The crop/hotspot handling replicates Sanity's own URL builder so that
//! the generated URLs hit the same CDN cache entries as the other Sanity clients.
//!
//! Reference doc: https://www.sanity.io/docs/image-urls

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{anyhow, bail};

use crate::portable_text::ImageRef;

const CDN_URL: &str = "https://cdn.sanity.io";

/// How an image is fitted to the requested width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    Clip,
    Crop,
    Fill,
    FillMax,
    Max,
    Scale,
    Min,
}

impl Display for FitMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FitMode::Clip => "clip",
            FitMode::Crop => "crop",
            FitMode::Fill => "fill",
            FitMode::FillMax => "fillmax",
            FitMode::Max => "max",
            FitMode::Scale => "scale",
            FitMode::Min => "min",
        })
    }
}

impl FromStr for FitMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clip" => FitMode::Clip,
            "crop" => FitMode::Crop,
            "fill" => FitMode::Fill,
            "fillmax" => FitMode::FillMax,
            "max" => FitMode::Max,
            "scale" => FitMode::Scale,
            "min" => FitMode::Min,
            _ => bail!("Unknown fit mode '{}'", s),
        })
    }
}

/// Builds image URLs for a project's dataset.
#[derive(Debug, Clone)]
pub struct ImageUrlBuilder {
    base_url: String,
    project_id: String,
    dataset: String,
}

impl ImageUrlBuilder {
    pub fn new(project_id: &str, dataset: &str) -> Self {
        ImageUrlBuilder {
            base_url: CDN_URL.to_string(),
            project_id: project_id.to_string(),
            dataset: dataset.to_string(),
        }
    }

    pub fn image<'a>(&'a self, source: &'a ImageRef) -> ImageUrl<'a> {
        ImageUrl {
            builder: self,
            source,
            width: None,
            height: None,
            fit: None,
            quality: None,
        }
    }
}

/// Single call form of the builder.
pub fn build_image_url(
    builder: &ImageUrlBuilder,
    source: &ImageRef,
    width: u32,
    height: u32,
    fit: FitMode,
    quality: Option<u8>,
) -> anyhow::Result<String> {
    let mut url = builder.image(source).width(width).height(height).fit(fit);
    if let Some(quality) = quality {
        url = url.quality(quality);
    }
    url.url()
}

/// Transformation parameters for an image.
#[derive(Debug, Clone)]
pub struct ImageUrl<'a> {
    builder: &'a ImageUrlBuilder,
    source: &'a ImageRef,
    width: Option<u32>,
    height: Option<u32>,
    fit: Option<FitMode>,
    quality: Option<u8>,
}

impl ImageUrl<'_> {
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn fit(mut self, fit: FitMode) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn url(&self) -> anyhow::Result<String> {
        let reference = self.source.asset.as_ref().ok_or_else(|| anyhow!("Image has no asset"))?;
        let asset = AssetId::parse(&reference.reference)?;
        let rect = self.rect(&asset);

        let mut url = format!(
            "{}/images/{}/{}/{}-{}x{}.{}",
            self.builder.base_url,
            self.builder.project_id,
            self.builder.dataset,
            asset.id,
            asset.width,
            asset.height,
            asset.format
        );

        let mut params = Vec::new();
        // Only bother with a rect if it actually crops something
        if rect.left != 0 || rect.top != 0 || rect.width != asset.width as i64 || rect.height != asset.height as i64 {
            params.push(format!("rect={},{},{},{}", rect.left, rect.top, rect.width, rect.height));
        }
        if let Some(w) = self.width {
            params.push(format!("w={}", w));
        }
        if let Some(h) = self.height {
            params.push(format!("h={}", h));
        }
        if let Some(q) = self.quality {
            params.push(format!("q={}", q));
        }
        if let Some(fit) = self.fit {
            params.push(format!("fit={}", fit));
        }

        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        Ok(url)
    }

    /// Source rectangle: the crop area, narrowed around the hotspot if the requested size
    /// has a different aspect ratio.
    fn rect(&self, asset: &AssetId) -> Rect {
        let crop = self.source.crop.unwrap_or_default();
        let hotspot = self.source.hotspot.unwrap_or_default();
        let (asset_w, asset_h) = (asset.width as f64, asset.height as f64);

        let crop_left = js_round(crop.left * asset_w);
        let crop_top = js_round(crop.top * asset_h);
        let crop = Rect {
            left: crop_left,
            top: crop_top,
            width: js_round(asset_w - crop.right * asset_w - crop_left as f64),
            height: js_round(asset_h - crop.bottom * asset_h - crop_top as f64),
        };

        let (width, height) = match (self.width, self.height) {
            (Some(w), Some(h)) if crop.width > 0 && crop.height > 0 && h > 0 => (w as f64, h as f64),
            // Aspect ratio isn't constrained, use the whole crop
            _ => return crop,
        };

        let hotspot_left = hotspot.x * asset_w - hotspot.width * asset_w / 2.0;
        let hotspot_right = hotspot.x * asset_w + hotspot.width * asset_w / 2.0;
        let hotspot_top = hotspot.y * asset_h - hotspot.height * asset_h / 2.0;
        let hotspot_bottom = hotspot.y * asset_h + hotspot.height * asset_h / 2.0;

        let desired_ratio = width / height;
        let crop_ratio = crop.width as f64 / crop.height as f64;

        if crop_ratio > desired_ratio {
            // Crop is wider than requested: cut from the sides, centred on the hotspot
            let height = crop.height;
            let width = js_round(height as f64 * desired_ratio);
            let top = crop.top.max(0);
            let center = js_round((hotspot_right - hotspot_left) / 2.0 + hotspot_left);
            let left = js_round(center as f64 - width as f64 / 2.0)
                .max(0)
                .clamp_within(crop.left, crop.left + crop.width - width);
            Rect { left, top, width, height }
        } else {
            // Crop is taller than requested: cut from top and bottom
            let width = crop.width;
            let height = js_round(width as f64 / desired_ratio);
            let left = crop.left.max(0);
            let center = js_round((hotspot_bottom - hotspot_top) / 2.0 + hotspot_top);
            let top = js_round(center as f64 - height as f64 / 2.0)
                .max(0)
                .clamp_within(crop.top, crop.top + crop.height - height);
            Rect { left, top, width, height }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    left: i64,
    top: i64,
    width: i64,
    height: i64,
}

trait ClampWithin {
    fn clamp_within(self, min: i64, max: i64) -> i64;
}

impl ClampWithin for i64 {
    /// Unlike `Ord::clamp`, doesn't panic if `min > max`: the lower bound wins.
    fn clamp_within(self, min: i64, max: i64) -> i64 {
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }
}

/// Rounds half up, like JavaScript's `Math.round` (`f64::round` rounds half away from zero).
fn js_round(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Parsed image asset reference, e.g. `image-Tb9Ew8CXIwaY6R1kjMvI0uRR-2000x3000-jpg`
#[derive(Debug, PartialEq)]
struct AssetId<'a> {
    id: &'a str,
    width: u32,
    height: u32,
    format: &'a str,
}

impl<'a> AssetId<'a> {
    fn parse(reference: &'a str) -> anyhow::Result<AssetId<'a>> {
        let mut parts = reference.split('-');
        match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("image"), Some(id), Some(dimensions), Some(format), None) => {
                let (width, height) = dimensions
                    .split_once('x')
                    .ok_or_else(|| anyhow!("Malformed image dimensions in asset reference {}", reference))?;
                Ok(AssetId {
                    id,
                    width: width.parse()?,
                    height: height.parse()?,
                    format,
                })
            }
            _ => bail!("Malformed image asset reference {}", reference),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portable_text::{AssetRef, Crop, Hotspot};

    fn image(reference: &str) -> ImageRef {
        ImageRef {
            asset: Some(AssetRef { reference: reference.to_string() }),
            alt: None,
            crop: None,
            hotspot: None,
        }
    }

    fn builder() -> ImageUrlBuilder {
        ImageUrlBuilder::new("proj", "production")
    }

    #[test]
    fn test_card_thumbnail_url() -> anyhow::Result<()> {
        let img = image("image-abc123-2000x1000-jpg");

        let url = build_image_url(&builder(), &img, 400, 225, FitMode::Crop, None)?;
        assert_eq!(
            "https://cdn.sanity.io/images/proj/production/abc123-2000x1000.jpg?rect=111,0,1778,1000&w=400&h=225&fit=crop",
            url
        );

        // Pure function
        assert_eq!(url, build_image_url(&builder(), &img, 400, 225, FitMode::Crop, None)?);
        Ok(())
    }

    #[test]
    fn test_missing_asset_is_an_error() {
        let img = ImageRef { asset: None, ..image("image-abc123-640x480-png") };
        let err = builder().image(&img).width(400).url().unwrap_err();
        assert_eq!("Image has no asset", err.to_string());
    }

    #[test]
    fn test_no_transformation() -> anyhow::Result<()> {
        let img = image("image-abc123-640x480-png");
        assert_eq!(
            "https://cdn.sanity.io/images/proj/production/abc123-640x480.png",
            builder().image(&img).url()?
        );
        assert_eq!(
            "https://cdn.sanity.io/images/proj/production/abc123-640x480.png?w=320&fit=max",
            builder().image(&img).width(320).fit(FitMode::Max).url()?
        );
        Ok(())
    }

    #[test]
    fn test_crop_and_hotspot() -> anyhow::Result<()> {
        let mut img = image("image-abc123-1000x1000-jpg");
        img.crop = Some(Crop { top: 0.0, bottom: 0.0, left: 0.1, right: 0.1 });

        let url = build_image_url(&builder(), &img, 200, 200, FitMode::Crop, Some(80))?;
        assert_eq!(
            "https://cdn.sanity.io/images/proj/production/abc123-1000x1000.jpg?rect=100,100,800,800&w=200&h=200&q=80&fit=crop",
            url
        );

        // Hotspot near the bottom: the rect is moved down and stays within the image
        img.hotspot = Some(Hotspot { x: 0.5, y: 0.9, width: 0.2, height: 0.2 });
        let url = build_image_url(&builder(), &img, 200, 200, FitMode::Crop, None)?;
        assert!(url.contains("rect=100,200,800,800"), "{}", url);

        // Crop without constrained aspect ratio
        let url = builder().image(&img).width(100).url()?;
        assert!(url.contains("rect=100,0,800,1000&w=100"), "{}", url);
        Ok(())
    }

    #[test]
    fn test_malformed_reference() {
        assert!(builder().image(&image("file-abc-pdf")).url().is_err());
        assert!(builder().image(&image("image-abc-large-jpg")).url().is_err());
    }

    #[test]
    fn test_fit_mode_names() -> anyhow::Result<()> {
        assert_eq!(FitMode::FillMax, "fillmax".parse()?);
        assert_eq!("crop", FitMode::Crop.to_string());
        assert!("cover".parse::<FitMode>().is_err());
        Ok(())
    }
}
