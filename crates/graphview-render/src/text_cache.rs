//! Cache of rasterized caption text.
//!
//! Bitmap rasterizers work at twice the requested size and the sprite is
//! displayed scaled down, so captions stay crisp when zoomed in. Rasterizers
//! producing vector output report an oversampling of 1. Entries carry a
//! logical last-used stamp; a full cache evicts its oldest tenth in one batch.

use kurbo::Size;
use peniko::Color;
use std::collections::HashMap;
use std::rc::Rc;

/// Default rasterization scale relative to the requested font size.
pub const OVERSAMPLING: f64 = 2.0;
/// Padding around the text, in logical pixels.
pub const TEXT_PADDING: f64 = 2.0;
pub const DEFAULT_TEXT_CACHE_CAPACITY: usize = 2000;

/// Structural cache key for one rendered string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextKey {
    pub text: String,
    /// Font size in hundredths of a pixel.
    pub font_size: u32,
    pub rgba: [u8; 4],
    pub family: String,
}

impl TextKey {
    pub fn new(text: &str, font_size: f64, color: Color, family: &str) -> Self {
        let rgba = color.to_rgba8();
        Self {
            text: text.to_string(),
            font_size: (font_size.max(0.0) * 100.0).round() as u32,
            rgba: [rgba.r, rgba.g, rgba.b, rgba.a],
            family: family.to_string(),
        }
    }

    pub fn font_size_px(&self) -> f64 {
        f64::from(self.font_size) / 100.0
    }

    pub fn color(&self) -> Color {
        let [r, g, b, a] = self.rgba;
        Color::from_rgba8(r, g, b, a)
    }
}

/// A rasterized string, sized in rasterizer pixels.
pub struct TextTexture<T> {
    pub texture: T,
    pub width: f64,
    pub height: f64,
    /// Distance from the top edge to the first baseline.
    pub baseline: f64,
}

impl<T> std::fmt::Debug for TextTexture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTexture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("baseline", &self.baseline)
            .finish_non_exhaustive()
    }
}

/// Turns strings into renderer textures.
pub trait TextRasterizer {
    type Texture;

    /// Rasterize `key` at `scale` times its font size, padded by `padding`
    /// (already scaled) on every side.
    fn rasterize(&mut self, key: &TextKey, scale: f64, padding: f64) -> TextTexture<Self::Texture>;

    /// Scale passed to [`rasterize`](Self::rasterize). Resolution-independent
    /// output gains nothing from oversampling and should return 1.
    fn oversampling(&self) -> f64 {
        OVERSAMPLING
    }
}

/// A texture scaled back down to its logical size.
pub struct TextSprite<T> {
    pub texture: Rc<TextTexture<T>>,
    pub scale: f64,
}

impl<T> Clone for TextSprite<T> {
    fn clone(&self) -> Self {
        Self {
            texture: Rc::clone(&self.texture),
            scale: self.scale,
        }
    }
}

impl<T> std::fmt::Debug for TextSprite<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSprite")
            .field("texture", &self.texture)
            .field("scale", &self.scale)
            .finish()
    }
}

impl<T> TextSprite<T> {
    /// Displayed size in logical pixels.
    pub fn size(&self) -> Size {
        Size::new(self.texture.width * self.scale, self.texture.height * self.scale)
    }

    /// Baseline offset from the top edge, in logical pixels.
    pub fn baseline(&self) -> f64 {
        self.texture.baseline * self.scale
    }
}

struct CacheEntry<T> {
    texture: Rc<TextTexture<T>>,
    last_used: u64,
}

pub struct TextCache<T> {
    rasterizer: Box<dyn TextRasterizer<Texture = T>>,
    entries: HashMap<TextKey, CacheEntry<T>>,
    capacity: usize,
    clock: u64,
}

impl<T> TextCache<T> {
    pub fn new(rasterizer: Box<dyn TextRasterizer<Texture = T>>) -> Self {
        Self {
            rasterizer,
            entries: HashMap::new(),
            capacity: DEFAULT_TEXT_CACHE_CAPACITY,
            clock: 0,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Texture for the given text, rasterized on a miss.
    pub fn get_text_texture(&mut self, text: &str, font_size: f64, color: Color, family: &str) -> Rc<TextTexture<T>> {
        self.get(TextKey::new(text, font_size, color, family))
    }

    /// Texture wrapped in a sprite scaled down by the oversampling factor.
    pub fn create_text_sprite(&mut self, text: &str, font_size: f64, color: Color, family: &str) -> TextSprite<T> {
        TextSprite {
            texture: self.get_text_texture(text, font_size, color, family),
            scale: 1.0 / self.rasterizer.oversampling(),
        }
    }

    pub fn get(&mut self, key: TextKey) -> Rc<TextTexture<T>> {
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = self.clock;
            return Rc::clone(&entry.texture);
        }
        if self.entries.len() >= self.capacity {
            self.evict();
        }
        let scale = self.rasterizer.oversampling();
        let texture = Rc::new(self.rasterizer.rasterize(&key, scale, TEXT_PADDING * scale));
        self.entries.insert(
            key,
            CacheEntry {
                texture: Rc::clone(&texture),
                last_used: self.clock,
            },
        );
        texture
    }

    fn evict(&mut self) {
        let count = self.capacity.div_ceil(10).max(1);
        let mut by_age: Vec<(u64, TextKey)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_used, _)| *last_used);
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }
        log::debug!("Evicted {count} text textures");
    }

    pub fn contains(&self, key: &TextKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> std::fmt::Debug for TextCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextCache")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubRasterizer;

    fn cache(capacity: usize) -> (TextCache<String>, Rc<std::cell::Cell<usize>>) {
        let (rasterizer, calls) = StubRasterizer::new();
        (TextCache::new(Box::new(rasterizer)).with_capacity(capacity), calls)
    }

    #[test]
    fn test_hit_reuses_texture() {
        let (mut cache, calls) = cache(10);
        let a = cache.get_text_texture("Ada", 10.0, Color::BLACK, "sans-serif");
        let b = cache.get_text_texture("Ada", 10.0, Color::BLACK, "sans-serif");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
        cache.get_text_texture("Ada", 12.0, Color::BLACK, "sans-serif");
        cache.get_text_texture("Ada", 10.0, Color::WHITE, "sans-serif");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_sprite_matches_requested_size() {
        let (mut cache, _) = cache(10);
        let sprite = cache.create_text_sprite("abcd", 10.0, Color::BLACK, "sans-serif");
        // The stub rasterizes each char as a font-size square plus padding.
        let size = sprite.size();
        assert!((size.width - (40.0 + 2.0 * TEXT_PADDING)).abs() < 1e-9);
        assert!((size.height - (10.0 + 2.0 * TEXT_PADDING)).abs() < 1e-9);
    }

    #[test]
    fn test_oversampling_comes_from_rasterizer() {
        let (mut cache, _) = cache(10);
        let sprite = cache.create_text_sprite("ab", 10.0, Color::BLACK, "sans-serif");
        assert!((sprite.scale - 1.0 / OVERSAMPLING).abs() < 1e-9);
        assert!((sprite.texture.width - 2.0 * (20.0 + 2.0 * TEXT_PADDING)).abs() < 1e-9);

        let (rasterizer, _) = StubRasterizer::<String>::new();
        let mut vector = TextCache::new(Box::new(rasterizer.with_oversampling(1.0)));
        let sprite = vector.create_text_sprite("ab", 10.0, Color::BLACK, "sans-serif");
        assert!((sprite.scale - 1.0).abs() < 1e-9);
        assert!((sprite.texture.width - (20.0 + 2.0 * TEXT_PADDING)).abs() < 1e-9);
        assert!((sprite.size().width - (20.0 + 2.0 * TEXT_PADDING)).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_bound() {
        let capacity = 20;
        let extra = 5;
        let (mut cache, _) = cache(capacity);
        let keys: Vec<String> = (0..capacity + extra).map(|i| format!("label {i}")).collect();
        for key in &keys {
            cache.get_text_texture(key, 10.0, Color::BLACK, "sans-serif");
            assert!(cache.len() <= capacity);
        }
        let keep = capacity * 9 / 10;
        for key in &keys[keys.len() - keep..] {
            assert!(cache.contains(&TextKey::new(key, 10.0, Color::BLACK, "sans-serif")));
        }
        assert!(!cache.contains(&TextKey::new(&keys[0], 10.0, Color::BLACK, "sans-serif")));
    }

    #[test]
    fn test_recently_used_survives_eviction() {
        let (mut cache, _) = cache(10);
        for i in 0..10 {
            cache.get_text_texture(&i.to_string(), 10.0, Color::BLACK, "sans-serif");
        }
        // Touch the oldest entry, then overflow.
        cache.get_text_texture("0", 10.0, Color::BLACK, "sans-serif");
        cache.get_text_texture("new", 10.0, Color::BLACK, "sans-serif");
        assert!(cache.contains(&TextKey::new("0", 10.0, Color::BLACK, "sans-serif")));
        assert!(!cache.contains(&TextKey::new("1", 10.0, Color::BLACK, "sans-serif")));
        assert_eq!(cache.len(), 10);
    }
}
