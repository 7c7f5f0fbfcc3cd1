use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    DeviceRGB,
    DeviceGray,
    DeviceCMYK,
    Indexed,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// A decoded image header plus the payload to embed as an XObject.
#[derive(Clone, Debug)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub bits_per_component: u8,
    pub filter: Option<&'static str>,
    /// Complete `/DecodeParms` entry, if the filter needs one.
    pub decode_parms: Option<String>,
    /// RGB triples for `Indexed` images.
    pub palette: Vec<u8>,
    /// Color-key mask values (`/Mask`).
    pub transparency: Option<Vec<u8>>,
    pub data: Vec<u8>,
    pub dpi: Option<f32>,
}

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Sniff the format from the magic bytes and parse accordingly.
pub fn parse_image(data: &[u8]) -> Result<ImageInfo, Error> {
    if data.starts_with(&[0xFF, 0xD8]) {
        parse_jpeg(data)
    } else if data.starts_with(PNG_SIGNATURE) {
        parse_png(data)
    } else {
        Err(Error::unsupported("image is neither JPEG nor PNG"))
    }
}

fn be16(data: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*data.get(pos)?, *data.get(pos + 1)?]))
}

fn be32(data: &[u8], pos: usize) -> Option<u32> {
    let b = data.get(pos..pos + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Walk the marker segments up to the first SOF header. The file itself is
/// embedded unchanged with `DCTDecode`.
pub fn parse_jpeg(data: &[u8]) -> Result<ImageInfo, Error> {
    let truncated = || Error::unsupported("truncated JPEG header");
    let mut pos = 2;
    let mut dpi = None;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
            pos += 2;
            continue;
        }
        let len = be16(data, pos + 2).ok_or_else(truncated)? as usize;
        let seg = pos + 4;
        match marker {
            0xE0 if data.get(seg..seg + 5) == Some(b"JFIF\0") => {
                let units = data.get(seg + 7).copied().unwrap_or(0);
                let density = be16(data, seg + 8).unwrap_or(0) as f32;
                dpi = match units {
                    1 if density > 0.0 => Some(density),
                    2 if density > 0.0 => Some(density * 2.54),
                    _ => dpi,
                };
            }
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let bits = *data.get(seg).ok_or_else(truncated)?;
                let height = be16(data, seg + 1).ok_or_else(truncated)? as u32;
                let width = be16(data, seg + 3).ok_or_else(truncated)? as u32;
                let channels = *data.get(seg + 5).ok_or_else(truncated)?;
                let color_space = match channels {
                    3 => ColorSpace::DeviceRGB,
                    4 => ColorSpace::DeviceCMYK,
                    _ => ColorSpace::DeviceGray,
                };
                return Ok(ImageInfo {
                    width,
                    height,
                    color_space,
                    bits_per_component: bits,
                    filter: Some("DCTDecode"),
                    decode_parms: None,
                    palette: Vec::new(),
                    transparency: None,
                    data: data.to_vec(),
                    dpi,
                });
            }
            0xD9 | 0xDA => break,
            _ => {}
        }
        pos += 2 + len;
    }
    Err(Error::unsupported("JPEG has no frame header"))
}

/// Read the chunk sequence (IHDR, PLTE, tRNS, pHYs, IDAT, IEND). The IDAT
/// stream is embedded as-is with PNG predictors; images with an alpha
/// channel are decoded and flattened onto white instead.
pub fn parse_png(data: &[u8]) -> Result<ImageInfo, Error> {
    let bad = || Error::unsupported("incorrect PNG file");
    if !data.starts_with(PNG_SIGNATURE) {
        return Err(Error::unsupported("not a PNG file"));
    }
    let mut pos = 8;
    if data.get(pos + 4..pos + 8) != Some(b"IHDR") {
        return Err(bad());
    }
    let ihdr = pos + 8;
    let width = be32(data, ihdr).ok_or_else(bad)?;
    let height = be32(data, ihdr + 4).ok_or_else(bad)?;
    let header = data.get(ihdr + 8..ihdr + 13).ok_or_else(bad)?;
    let (bpc, color_type, compression, filter_method, interlace) =
        (header[0], header[1], header[2], header[3], header[4]);
    if bpc > 8 {
        return Err(Error::unsupported("16-bit PNG depth not supported"));
    }
    let color_space = match color_type {
        0 | 4 => ColorSpace::DeviceGray,
        2 | 6 => ColorSpace::DeviceRGB,
        3 => ColorSpace::Indexed,
        other => return Err(Error::unsupported(format!("unknown PNG color type {other}"))),
    };
    if compression != 0 {
        return Err(Error::unsupported("unknown PNG compression method"));
    }
    if filter_method != 0 {
        return Err(Error::unsupported("unknown PNG filter method"));
    }
    if interlace != 0 {
        return Err(Error::unsupported("interlaced PNG not supported"));
    }
    pos = ihdr + 13 + 4;

    let mut palette = Vec::new();
    let mut transparency = None;
    let mut idat = Vec::new();
    let mut dpi = None;
    loop {
        let len = be32(data, pos).ok_or_else(bad)? as usize;
        let kind = data.get(pos + 4..pos + 8).ok_or_else(bad)?;
        let body_start = pos + 8;
        let body = data.get(body_start..body_start + len).ok_or_else(bad)?;
        match kind {
            b"PLTE" => palette = body.to_vec(),
            b"tRNS" => {
                transparency = match color_type {
                    0 => body.get(1).map(|v| vec![*v]),
                    2 => match (body.get(1), body.get(3), body.get(5)) {
                        (Some(r), Some(g), Some(b)) => Some(vec![*r, *g, *b]),
                        _ => None,
                    },
                    _ => body.iter().position(|a| *a == 0).map(|idx| vec![idx as u8]),
                };
            }
            b"pHYs" => {
                let ppu = be32(body, 0).unwrap_or(0) as f32;
                if body.get(8) == Some(&1) && ppu > 0.0 {
                    dpi = Some(ppu * 0.0254);
                }
            }
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
        pos = body_start + len + 4;
    }

    if color_space == ColorSpace::Indexed && palette.is_empty() {
        return Err(Error::unsupported("PNG palette missing"));
    }
    if color_type == 4 || color_type == 6 {
        return flatten_alpha_png(data, width, height, color_space, dpi);
    }

    let colors = if color_type == 2 { 3 } else { 1 };
    Ok(ImageInfo {
        width,
        height,
        color_space,
        bits_per_component: bpc,
        filter: Some("FlateDecode"),
        decode_parms: Some(format!(
            "/DecodeParms <</Predictor 15 /Colors {colors} /BitsPerComponent {bpc} /Columns {width}>>"
        )),
        palette,
        transparency,
        data: idat,
        dpi,
    })
}

/// Composite gray+alpha / RGBA pixels over a white page and re-encode them
/// as plain deflated samples.
fn flatten_alpha_png(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: ColorSpace,
    dpi: Option<f32>,
) -> Result<ImageInfo, Error> {
    let decoded = ::image::load_from_memory_with_format(data, ::image::ImageFormat::Png)
        .map_err(|e| Error::unsupported(format!("PNG decode failed: {e}")))?;
    let over_white = |v: u8, a: u8| -> u8 {
        let (v, a) = (v as u32, a as u32);
        ((v * a + 255 * (255 - a)) / 255) as u8
    };
    let raw: Vec<u8> = if color_space == ColorSpace::DeviceGray {
        decoded
            .to_luma_alpha8()
            .pixels()
            .map(|p| over_white(p.0[0], p.0[1]))
            .collect()
    } else {
        decoded
            .to_rgba8()
            .pixels()
            .flat_map(|p| {
                let [r, g, b, a] = p.0;
                [over_white(r, a), over_white(g, a), over_white(b, a)]
            })
            .collect()
    };
    log::debug!("Flattened {width}x{height} PNG alpha channel onto white");
    Ok(ImageInfo {
        width,
        height,
        color_space,
        bits_per_component: 8,
        filter: Some("FlateDecode"),
        decode_parms: None,
        palette: Vec::new(),
        transparency: None,
        data: miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6),
        dpi,
    })
}

/// 32x32 gray box with a cross, shown in place of images that cannot be loaded.
pub fn placeholder() -> ImageInfo {
    const SIDE: u32 = 32;
    let mut raw = Vec::with_capacity((SIDE * SIDE) as usize);
    for y in 0..SIDE {
        for x in 0..SIDE {
            let edge = x == 0 || y == 0 || x == SIDE - 1 || y == SIDE - 1;
            let diagonal = x == y || x + y == SIDE - 1;
            raw.push(if edge || diagonal { 96 } else { 224 });
        }
    }
    ImageInfo {
        width: SIDE,
        height: SIDE,
        color_space: ColorSpace::DeviceGray,
        bits_per_component: 8,
        filter: Some("FlateDecode"),
        decode_parms: None,
        palette: Vec::new(),
        transparency: None,
        data: miniz_oxide::deflate::compress_to_vec_zlib(&raw, 6),
        dpi: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_chunk(kind: &[u8], body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]);
        out
    }

    fn png_with(bpc: u8, color_type: u8, interlace: u8) -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        let mut ihdr = 2u32.to_be_bytes().to_vec();
        ihdr.extend_from_slice(&3u32.to_be_bytes());
        ihdr.extend_from_slice(&[bpc, color_type, 0, 0, interlace]);
        data.extend(png_chunk(b"IHDR", &ihdr));
        data.extend(png_chunk(b"PLTE", &[255, 0, 0, 0, 0, 255]));
        data.extend(png_chunk(b"tRNS", &[255, 0]));
        data.extend(png_chunk(b"IDAT", &[1, 2, 3]));
        data.extend(png_chunk(b"IEND", &[]));
        data
    }

    #[test]
    fn indexed_png_reads_palette_and_mask() {
        let info = parse_png(&png_with(8, 3, 0)).unwrap();
        assert_eq!((info.width, info.height), (2, 3));
        assert_eq!(info.color_space, ColorSpace::Indexed);
        assert_eq!(info.palette.len(), 6);
        assert_eq!(info.transparency, Some(vec![1]));
        assert_eq!(info.data, vec![1, 2, 3]);
        assert!(info.decode_parms.unwrap().contains("/Colors 1"));
    }

    #[test]
    fn png_rejections() {
        assert!(matches!(parse_png(&png_with(16, 2, 0)), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(parse_png(&png_with(8, 2, 1)), Err(Error::UnsupportedFormat(_))));
        assert!(matches!(parse_image(b"GIF89a...."), Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn jpeg_sof_and_density() {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend_from_slice(&[0xFF, 0xE0, 0, 16]);
        jpeg.extend_from_slice(b"JFIF\0");
        jpeg.extend_from_slice(&[1, 1, 1, 0, 150, 0, 150, 0, 0]);
        jpeg.extend_from_slice(&[0xFF, 0xC0, 0, 17, 8, 0, 40, 0, 60, 3]);
        jpeg.extend_from_slice(&[0; 9]);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        let info = parse_jpeg(&jpeg).unwrap();
        assert_eq!((info.width, info.height), (60, 40));
        assert_eq!(info.color_space, ColorSpace::DeviceRGB);
        assert_eq!(info.dpi, Some(150.0));
        assert_eq!(info.filter, Some("DCTDecode"));
    }

    #[test]
    fn placeholder_is_small_gray() {
        let info = placeholder();
        assert_eq!(info.color_space, ColorSpace::DeviceGray);
        assert!(!info.data.is_empty());
    }
}
