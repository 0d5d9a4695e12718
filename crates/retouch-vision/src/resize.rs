//! 고속 리사이즈.
//!
//! fast_image_resize 기반 RGBA 리사이즈.
//! 입력 이미지는 변경하지 않고 새 이미지를 반환한다.

use fast_image_resize::{images::Image as FirImage, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbaImage};
use retouch_core::error::CoreError;
use tracing::debug;

/// 픽셀 예산에 맞춘 목표 크기 계산
///
/// 배율 `sqrt(budget / (w*h))`를 양 축에 적용하고 내림한다 (최소 1px).
/// 이미 예산 이내면 원본 크기를 그대로 반환.
pub fn fit_to_pixel_budget(width: u32, height: u32, pixel_budget: u64) -> (u32, u32) {
    let pixels = width as u64 * height as u64;
    if pixels == 0 || pixels <= pixel_budget {
        return (width, height);
    }

    let scale = (pixel_budget as f64 / pixels as f64).sqrt();
    let mut w = ((width as f64 * scale).floor() as u32).max(1);
    let mut h = ((height as f64 * scale).floor() as u32).max(1);

    // 짧은 축을 1px로 올리면 긴 축이 예산을 넘을 수 있음
    if w as u64 * h as u64 > pixel_budget {
        if h <= w {
            w = (pixel_budget / h as u64).clamp(1, width as u64) as u32;
        } else {
            h = (pixel_budget / w as u64).clamp(1, height as u64) as u32;
        }
    }
    (w, h)
}

/// 고속 리사이즈 (Bilinear convolution)
pub fn fast_resize(
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<DynamicImage, CoreError> {
    let (src_w, src_h) = (image.width(), image.height());

    if src_w == width && src_h == height {
        return Ok(image.clone());
    }
    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Image("소스 이미지 크기 0".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Image("목표 이미지 크기 0".to_string()));
    }

    let src_rgba = image.to_rgba8();

    let src_image = FirImage::from_vec_u8(
        src_w,
        src_h,
        src_rgba.into_raw(),
        fast_image_resize::PixelType::U8x4,
    )
    .map_err(|e| CoreError::Image(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(width, height, fast_image_resize::PixelType::U8x4);

    let mut resizer = Resizer::new();
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Image(format!("리사이즈 실패: {e}")))?;

    let result = RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Image("결과 이미지 생성 실패".to_string()))?;

    debug!("리사이즈: {}x{} → {}x{}", src_w, src_h, width, height);

    Ok(DynamicImage::ImageRgba8(result))
}
