/// Photo view
///
/// Shows the current frame centered on black. When the caption could not
/// be burned into the pixels (no TrueType font), it is drawn here instead,
/// in the bottom-right corner of the photo.
use iced::widget::{container, image, stack, text};
use iced::{Alignment, Background, Color, Element, Length};

use crate::photo::render::{Caption, RenderedFrame};
use crate::Message;

/// Matches the burned-in caption: 10px from the edges, 5px box padding
const CAPTION_MARGIN: u16 = 10;
const CAPTION_PADDING: u16 = 5;
const CAPTION_SIZE: u16 = 18;

/// A rendered photo uploaded as an iced image handle
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub handle: image::Handle,
    pub width: u32,
    pub height: u32,
    /// Caption the view has to draw itself
    pub caption: Option<String>,
}

impl From<RenderedFrame> for DisplayFrame {
    fn from(frame: RenderedFrame) -> Self {
        let (width, height) = frame.image.dimensions();
        let caption = match frame.caption {
            Caption::Fallback(text) => Some(text),
            Caption::Burned | Caption::None => None,
        };

        Self {
            // Moves the pixel buffer, no copy
            handle: image::Handle::from_rgba(width, height, frame.image.into_raw()),
            width,
            height,
            caption,
        }
    }
}

/// Build the full-window view for the current frame
pub fn view(frame: Option<&DisplayFrame>) -> Element<'_, Message> {
    let content: Element<'_, Message> = match frame {
        Some(frame) => photo_with_caption(frame),
        None => text("Loading photo...")
            .size(16)
            .color(Color::from_rgb(0.5, 0.5, 0.5))
            .into(),
    };

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(Background::Color(Color::BLACK)),
            ..container::Style::default()
        })
        .into()
}

fn photo_with_caption(frame: &DisplayFrame) -> Element<'_, Message> {
    // The photo is already sized to the window, draw it 1:1
    let photo = image(frame.handle.clone())
        .width(Length::Fixed(frame.width as f32))
        .height(Length::Fixed(frame.height as f32));

    let Some(caption) = &frame.caption else {
        return photo.into();
    };

    let label = container(text(caption).size(CAPTION_SIZE).color(Color::WHITE))
        .padding(CAPTION_PADDING)
        .style(|_theme| container::Style {
            background: Some(Background::Color(Color::from_rgba(0.0, 0.0, 0.0, 0.5))),
            ..container::Style::default()
        });

    let overlay = container(label)
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(CAPTION_MARGIN)
        .align_x(Alignment::End)
        .align_y(Alignment::End);

    // First layer sets the size of the stack
    stack![photo, overlay].into()
}
