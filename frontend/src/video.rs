//! SDL2 presentation: uploads the compositor's palette-indexed [`Surface`]
//! to an RGB24 texture and presents it scaled to the window.
//!
//! Grounded on `frontend/src/video.rs`'s `Video` (window/canvas/texture-
//! creator wrapper); the indexed-to-RGB24 expansion is new, since the
//! teacher's machines render RGB24 framebuffers directly.

use gamos_core::compositor::{Palette, Surface};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};

pub struct Video {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
    width: u32,
    height: u32,
    rgb_buf: Vec<u8>,
}

impl Video {
    /// Create an SDL window and renderer for the given native resolution.
    pub fn new(sdl_video: &sdl2::VideoSubsystem, title: &str, native_width: u32, native_height: u32, scale: u32) -> Self {
        let window = sdl_video
            .window(title, native_width * scale, native_height * scale)
            .position_centered()
            .build()
            .expect("Failed to create window");

        let canvas = window.into_canvas().accelerated().build().expect("Failed to create canvas");

        let texture_creator = canvas.texture_creator();

        Self {
            canvas,
            texture_creator,
            width: native_width,
            height: native_height,
            rgb_buf: vec![0u8; (native_width * native_height * 3) as usize],
        }
    }

    /// Expands `surface` through `palette` into RGB24 and presents it.
    pub fn present(&mut self, surface: &Surface, palette: &Palette) {
        self.rgb_buf.resize((self.width * self.height * 3) as usize, 0);
        for (i, &idx) in surface.pixels.iter().enumerate() {
            let rgb = palette[idx as usize];
            self.rgb_buf[i * 3] = rgb[0];
            self.rgb_buf[i * 3 + 1] = rgb[1];
            self.rgb_buf[i * 3 + 2] = rgb[2];
        }

        let mut texture = self
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, self.width, self.height)
            .expect("Failed to create texture");

        texture
            .update(None, &self.rgb_buf, (self.width * 3) as usize)
            .expect("Failed to update texture");

        self.canvas.clear();
        self.canvas.copy(&texture, None, None).expect("Failed to copy texture");
        self.canvas.present();
    }
}
