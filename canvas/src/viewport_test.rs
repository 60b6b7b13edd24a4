#![allow(clippy::float_cmp)]

use super::*;

#[test]
fn to_fraction_offsets_and_scales() {
    let vp = Viewport { left: 10.0, top: 20.0, width: 200.0, height: 100.0 };
    let p = vp.to_fraction(Point::new(110.0, 45.0));
    assert_eq!(p, Point::new(0.5, 0.25));
}

#[test]
fn to_fraction_zero_size_uses_one() {
    let vp = Viewport { left: 5.0, top: 5.0, width: 0.0, height: 0.0 };
    let p = vp.to_fraction(Point::new(7.0, 8.0));
    assert_eq!(p, Point::new(2.0, 3.0));
}

#[test]
fn to_fraction_outside_canvas_is_not_clamped() {
    let vp = Viewport { left: 0.0, top: 0.0, width: 100.0, height: 100.0 };
    let p = vp.to_fraction(Point::new(-50.0, 150.0));
    assert_eq!(p, Point::new(-0.5, 1.5));
}

#[test]
fn bounds_to_px() {
    let b = Bounds::new(800.0, 600.0);
    assert_eq!(b.to_px(Point::new(0.5, 0.25)), Point::new(400.0, 150.0));
}

#[test]
fn max_ripple_radius_is_half_longest_side() {
    assert_eq!(Bounds::new(800.0, 600.0).max_ripple_radius(), 400.0);
    assert_eq!(Bounds::new(300.0, 900.0).max_ripple_radius(), 450.0);
}

#[test]
fn viewport_bounds_drop_offset() {
    let vp = Viewport { left: 3.0, top: 4.0, width: 640.0, height: 480.0 };
    assert_eq!(vp.bounds(), Bounds::new(640.0, 480.0));
}
