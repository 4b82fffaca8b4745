//! `<picture>` markup for a resolved image.
//!
//! Browsers pick the first `<source>` whose `type` they support, so sources
//! are emitted AVIF, WebP, fallback. The inner `<img>` carries the smallest
//! fallback derivative for clients that ignore `<picture>` entirely.
//!
//! The original path is never rendered. Sources below the generator's size
//! threshold have no derivatives, so for those every URL here 404s; callers
//! that cannot rule this out should render `original_src` themselves, resolve
//! with `resolve_strict`, or run `imgset check`, which lists such files as
//! skipped.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::resolve::Resolved;
use maud::{Markup, html};

/// Attributes copied onto the rendered elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PictureAttrs {
    pub alt: String,
    /// `sizes` for every `<source>`, e.g. `(max-width: 800px) 100vw, 50vw`.
    pub sizes: Option<String>,
    /// `class` of the `<img>`.
    pub class: Option<String>,
    /// `class` of the `<picture>`.
    pub picture_class: Option<String>,
    /// `loading` of the `<img>`, e.g. `lazy`.
    pub loading: Option<String>,
}

/// Render a resolved image. Pass-through inputs become a bare `<img>`; an
/// empty source renders nothing.
pub fn render_picture(resolved: &Resolved, attrs: &PictureAttrs) -> Markup {
    match resolved {
        Resolved::PassThrough { src } if src.is_empty() => html! {},
        Resolved::PassThrough { src } => html! {
            img src=(src) alt=(attrs.alt) class=[attrs.class.as_deref()]
                loading=[attrs.loading.as_deref()];
        },
        Resolved::Candidates(set) => html! {
            picture class=[attrs.picture_class.as_deref()] {
                @for tier in &set.sources {
                    source type=(tier.mime_type()) srcset=(tier.srcset())
                        sizes=[attrs.sizes.as_deref()];
                }
                img src=(set.fallback_src) alt=(attrs.alt) class=[attrs.class.as_deref()]
                    loading=[attrs.loading.as_deref()];
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Resolver;

    fn render(src: &str, attrs: &PictureAttrs) -> String {
        let resolved = Resolver::default().resolve(src, &[320, 640]);
        render_picture(&resolved, attrs).into_string()
    }

    #[test]
    fn local_png_renders_three_sources_in_order() {
        let html = render("/images/a.png", &PictureAttrs::default());

        assert!(html.starts_with("<picture>"));
        let avif = html.find(r#"type="image/avif""#).unwrap();
        let webp = html.find(r#"type="image/webp""#).unwrap();
        let png = html.find(r#"type="image/png""#).unwrap();
        let img = html.find("<img").unwrap();
        assert!(avif < webp && webp < png && png < img);
        assert!(html.contains(
            r#"srcset="/optimized/images/a-w320.webp 320w, /optimized/images/a-w640.webp 640w""#
        ));
        assert!(html.contains(r#"<img src="/optimized/images/a-w320.png" alt="">"#));
    }

    #[test]
    fn img_src_is_smallest_derivative_never_the_original() {
        let resolved = Resolver::default().resolve("/images/a.jpg?v=2", &[640, 320]);
        let html = render_picture(&resolved, &PictureAttrs::default()).into_string();

        assert!(html.contains(r#"<img src="/optimized/images/a-w320.jpg""#));
        assert!(!html.contains("/images/a.jpg"));
        assert_eq!(resolved.candidates().unwrap().original_src, "/images/a.jpg?v=2");
    }

    #[test]
    fn jpeg_fallback_source_type() {
        let html = render("/a.jpg", &PictureAttrs::default());
        assert!(html.contains(r#"type="image/jpeg""#));
        assert!(html.contains("a-w320.jpg"));
    }

    #[test]
    fn optional_attributes_are_rendered_when_set() {
        let attrs = PictureAttrs {
            alt: "Skynest dashboard".to_string(),
            sizes: Some("(max-width: 800px) 100vw, 50vw".to_string()),
            class: Some("rounded".to_string()),
            picture_class: Some("hero".to_string()),
            loading: Some("lazy".to_string()),
        };
        let html = render("/a.png", &attrs);

        assert!(html.starts_with(r#"<picture class="hero">"#));
        assert_eq!(html.matches(r#"sizes="(max-width: 800px) 100vw, 50vw""#).count(), 3);
        assert!(html.contains(r#"alt="Skynest dashboard""#));
        assert!(html.contains(r#"class="rounded""#));
        assert!(html.contains(r#"loading="lazy""#));
    }

    #[test]
    fn unset_optional_attributes_are_omitted() {
        let html = render("/a.png", &PictureAttrs::default());
        assert!(!html.contains("sizes="));
        assert!(!html.contains("class="));
        assert!(!html.contains("loading="));
    }

    #[test]
    fn remote_source_renders_bare_img() {
        let html = render("https://example.com/a.png", &PictureAttrs::default());
        assert_eq!(html, r#"<img src="https://example.com/a.png" alt="">"#);
    }

    #[test]
    fn empty_source_renders_nothing() {
        assert_eq!(render("", &PictureAttrs::default()), "");
    }

    #[test]
    fn alt_text_is_escaped() {
        let attrs = PictureAttrs {
            alt: r#"a "quoted" <b>"#.to_string(),
            ..PictureAttrs::default()
        };
        let html = render("/a.png", &attrs);
        assert!(html.contains("&quot;quoted&quot; &lt;b&gt;"));
    }
}
