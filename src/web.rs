//! Browser painter over a 2D canvas context.
//!
//! This module is the only place that touches [`web_sys::CanvasRenderingContext2d`].
//! Every fallible canvas call maps its `JsValue` error into
//! [`RenderError::Painter`] so [`crate::engine::EngineCore::frame`] can report it.

use std::f64::consts::TAU;

use js_sys::Array;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::camera::{Point, Transform};
use crate::render::{Painter, RenderError, ShapeStyle};

/// Label font size in screen pixels.
const LABEL_FONT_PX: f64 = 12.0;

/// Glow blur radius in screen pixels.
const GLOW_BLUR_PX: f64 = 12.0;

/// Dash segment length in screen pixels.
const DASH_PX: f64 = 6.0;

fn js_err(e: JsValue) -> RenderError {
    RenderError::Painter(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

/// [`Painter`] backed by a browser canvas.
pub struct CanvasPainter {
    ctx: CanvasRenderingContext2d,
    dpr: f64,
    /// Camera scale of the current frame; converts screen-pixel widths to world units.
    scale: f64,
}

impl CanvasPainter {
    #[must_use]
    pub fn new(ctx: CanvasRenderingContext2d, dpr: f64) -> Self {
        Self { ctx, dpr: sanitize_dpr(dpr), scale: 1.0 }
    }

    /// Grab the element's 2D context.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Painter`] when the element has no 2D context.
    pub fn from_canvas(canvas: &HtmlCanvasElement, dpr: f64) -> Result<Self, RenderError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(js_err)?
            .ok_or_else(|| RenderError::Painter("canvas has no 2d context".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| RenderError::Painter("2d context has an unexpected type".into()))?;
        Ok(Self::new(ctx, dpr))
    }

    /// Device pixel ratio changed (zoom or monitor move).
    pub fn set_dpr(&mut self, dpr: f64) {
        self.dpr = sanitize_dpr(dpr);
    }

    fn screen_px(&self, px: f64) -> f64 {
        px / self.scale
    }

    fn apply_style(&self, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ctx.set_global_alpha(style.alpha.clamp(0.0, 1.0));
        self.ctx.set_line_width(self.screen_px(style.line_width));
        if let Some(fill) = style.fill {
            self.ctx.set_fill_style_str(fill);
        }
        if let Some(stroke) = style.stroke {
            self.ctx.set_stroke_style_str(stroke);
        }
        if style.glow {
            self.ctx.set_shadow_blur(GLOW_BLUR_PX * self.dpr);
            self.ctx.set_shadow_color(style.fill.or(style.stroke).unwrap_or("#ffffff"));
        } else {
            self.ctx.set_shadow_blur(0.0);
        }
        let dash = Array::new();
        if style.dashed {
            let seg = JsValue::from_f64(self.screen_px(DASH_PX));
            dash.push(&seg);
            dash.push(&seg);
        }
        self.ctx.set_line_dash(&dash).map_err(js_err)
    }

    fn paint(&self, style: &ShapeStyle<'_>) {
        if style.fill.is_some() {
            self.ctx.fill();
        }
        if style.stroke.is_some() {
            self.ctx.stroke();
        }
    }
}

fn sanitize_dpr(dpr: f64) -> f64 {
    if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 }
}

impl Painter for CanvasPainter {
    fn begin_frame(&mut self, width: f64, height: f64, transform: Transform) -> Result<(), RenderError> {
        self.scale = if transform.scale > 0.0 { transform.scale } else { 1.0 };
        self.ctx.set_transform(self.dpr, 0.0, 0.0, self.dpr, 0.0, 0.0).map_err(js_err)?;
        self.ctx.clear_rect(0.0, 0.0, width, height);
        self.ctx.translate(transform.tx, transform.ty).map_err(js_err)?;
        self.ctx.scale(transform.scale, transform.scale).map_err(js_err)
    }

    fn circle(&mut self, center: Point, r: f64, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ctx.save();
        self.apply_style(style)?;
        self.ctx.begin_path();
        self.ctx.arc(center.x, center.y, r, 0.0, TAU).map_err(js_err)?;
        self.paint(style);
        self.ctx.restore();
        Ok(())
    }

    fn line(&mut self, from: Point, to: Point, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ctx.save();
        self.apply_style(style)?;
        self.ctx.begin_path();
        self.ctx.move_to(from.x, from.y);
        self.ctx.line_to(to.x, to.y);
        self.ctx.stroke();
        self.ctx.restore();
        Ok(())
    }

    fn label(&mut self, at: Point, text: &str, style: &ShapeStyle<'_>) -> Result<(), RenderError> {
        self.ctx.save();
        self.apply_style(style)?;
        self.ctx.set_font(&format!("{}px sans-serif", self.screen_px(LABEL_FONT_PX)));
        self.ctx.set_text_align("center");
        self.ctx.set_text_baseline("middle");
        self.ctx.fill_text(text, at.x, at.y).map_err(js_err)?;
        self.ctx.restore();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0).map_err(js_err)
    }
}
