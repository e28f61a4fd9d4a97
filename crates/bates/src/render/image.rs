use image::{ColorType, GenericImageView, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::LETTER;
use crate::error::ConvertError;

/// Margin around the image, in points.
const MARGIN: f32 = 36.0;

/// Places an image, scaled to fit, on a single US Letter page.
pub fn render_image_pdf(image_data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ConvertError::Image(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ConvertError::Image("image has no pixels".to_string()));
    }

    let is_rgb_jpeg = matches!(image::guess_format(image_data), Ok(ImageFormat::Jpeg))
        && img.color() == ColorType::Rgb8;

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    // RGB JPEGs are embedded as-is; everything else is expanded to raw RGB
    let image_stream = if is_rgb_jpeg {
        image_dict.set("Filter", "DCTDecode");
        Stream::new(image_dict, image_data.to_vec())
    } else {
        Stream::new(image_dict, img.to_rgb8().into_raw())
    };

    let (page_width, page_height) = LETTER;
    let scale = ((page_width - 2.0 * MARGIN) / width as f32)
        .min((page_height - 2.0 * MARGIN) / height as f32);
    let draw_width = width as f32 * scale;
    let draw_height = height as f32 * scale;
    let x = (page_width - draw_width) / 2.0;
    let y = (page_height - draw_height) / 2.0;

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_width.into(),
                    0.into(),
                    0.into(),
                    draw_height.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ConvertError::Render(e.to_string()))?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(image_stream);
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConvertError::Render(e.to_string()))?;
    Ok(buffer)
}
