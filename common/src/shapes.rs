use rand::Rng;
use std::fmt::Debug;
use std::ops::{Add, Mul, Sub};

pub type Real = f64;

pub trait Shape: Debug {
    fn bounding_box(&self) -> Rect;
    fn contains_point(&self, p: &Pos) -> bool;
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Pos {
    pub x: Real,
    pub y: Real,
}

impl Pos {
    pub fn new(x: Real, y: Real) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Pos) -> Real {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Pos) -> Real {
        self.distance_sq(other).sqrt()
    }

    pub fn offset(&self, v: &Vec2) -> Pos {
        Pos::new(self.x + v.x, self.y + v.y)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: Real,
    pub y: Real,
}

impl Vec2 {
    pub fn new(x: Real, y: Real) -> Self {
        Self { x, y }
    }

    // Vector pointing from p0 to p1.
    pub fn between(p0: &Pos, p1: &Pos) -> Self {
        Self {
            x: p1.x - p0.x,
            y: p1.y - p0.y,
        }
    }

    pub fn dot(&self, other: &Vec2) -> Real {
        self.x * other.x + self.y * other.y
    }

    pub fn length_sq(&self) -> Real {
        self.dot(self)
    }

    pub fn length(&self) -> Real {
        self.length_sq().sqrt()
    }

    pub fn abs(&self) -> Self {
        Self {
            x: self.x.abs(),
            y: self.y.abs(),
        }
    }

    /// Component of `self` along `dir`. `dir` must be normalized.
    pub fn parallel(&self, dir: &Vec2) -> Self {
        *dir * self.dot(dir)
    }

    /// Component of `self` perpendicular to `dir`. `dir` must be normalized.
    pub fn perpendicular(&self, dir: &Vec2) -> Self {
        *self - self.parallel(dir)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<Real> for Vec2 {
    type Output = Vec2;

    fn mul(self, a: Real) -> Vec2 {
        Vec2::new(self.x * a, self.y * a)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Size {
    pub w: Real,
    pub h: Real,
}

impl Size {
    pub fn new(w: Real, h: Real) -> Self {
        Self { w, h }
    }
}

/// Axis aligned rectangle anchored at its minimum corner.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub pos: Pos,
    pub size: Size,
}

impl Rect {
    pub fn new(x: Real, y: Real, w: Real, h: Real) -> Self {
        Self {
            pos: Pos::new(x, y),
            size: Size::new(w, h),
        }
    }

    pub fn from_center(center: &Pos, half_w: Real, half_h: Real) -> Self {
        Self::new(
            center.x - half_w,
            center.y - half_h,
            half_w * 2.0,
            half_h * 2.0,
        )
    }

    pub fn left(&self) -> Real {
        self.pos.x
    }

    pub fn right(&self) -> Real {
        self.pos.x + self.size.w
    }

    pub fn bottom(&self) -> Real {
        self.pos.y
    }

    pub fn top(&self) -> Real {
        self.pos.y + self.size.h
    }

    pub fn center(&self) -> Pos {
        Pos::new(
            self.pos.x + self.size.w * 0.5,
            self.pos.y + self.size.h * 0.5,
        )
    }

    /// True when `other` lies entirely inside `self`, edges included.
    pub fn contains(&self, other: &Rect) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.bottom() >= self.bottom()
            && other.top() <= self.top()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(other.left() > self.right()
            || other.right() < self.left()
            || other.bottom() > self.top()
            || other.top() < self.bottom())
    }

    pub fn distance_sq_to_point(&self, p: &Pos) -> Real {
        let dx = if p.x < self.left() {
            self.left() - p.x
        } else if p.x > self.right() {
            p.x - self.right()
        } else {
            0.0
        };
        let dy = if p.y < self.bottom() {
            self.bottom() - p.y
        } else if p.y > self.top() {
            p.y - self.top()
        } else {
            0.0
        };
        dx * dx + dy * dy
    }

    pub fn intersects_circle(&self, circle: &Circle) -> bool {
        self.distance_sq_to_point(&circle.pos) <= circle.radius * circle.radius
    }

    /// Grows every edge outward by `margin`.
    pub fn expand(&self, margin: Real) -> Rect {
        Rect::new(
            self.pos.x - margin,
            self.pos.y - margin,
            self.size.w + margin * 2.0,
            self.size.h + margin * 2.0,
        )
    }

    pub fn random_point_inside<R: Rng>(&self, rng: &mut R) -> Pos {
        Pos::new(
            safe_rand(rng, self.left(), self.right()),
            safe_rand(rng, self.bottom(), self.top()),
        )
    }
}

fn safe_rand<R: Rng>(rng: &mut R, min: Real, max: Real) -> Real {
    if min >= max {
        return min;
    }
    rng.gen_range(min..=max)
}

impl Shape for Rect {
    fn bounding_box(&self) -> Rect {
        *self
    }

    fn contains_point(&self, p: &Pos) -> bool {
        p.x >= self.left() && p.x <= self.right() && p.y >= self.bottom() && p.y <= self.top()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircleRelation {
    BContainsA = -2,
    AContainsB = -1,
    NoIntersect = 0,
    Intersect = 1,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Circle {
    pub pos: Pos,
    pub radius: Real,
}

impl Circle {
    pub fn new(x: Real, y: Real, radius: Real) -> Self {
        Self {
            pos: Pos::new(x, y),
            radius,
        }
    }

    pub fn intersects(&self, other: &Circle) -> bool {
        let r = self.radius + other.radius;
        self.pos.distance_sq(&other.pos) <= r * r
    }

    /// True when `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Circle) -> bool {
        if other.radius > self.radius {
            return false;
        }
        let r = self.radius - other.radius;
        self.pos.distance_sq(&other.pos) <= r * r
    }

    pub fn relation(&self, other: &Circle) -> CircleRelation {
        if !self.intersects(other) {
            CircleRelation::NoIntersect
        } else if self.contains(other) {
            CircleRelation::AContainsB
        } else if other.contains(self) {
            CircleRelation::BContainsA
        } else {
            CircleRelation::Intersect
        }
    }
}

impl Shape for Circle {
    fn bounding_box(&self) -> Rect {
        Rect::from_center(&self.pos, self.radius, self.radius)
    }

    fn contains_point(&self, p: &Pos) -> bool {
        self.pos.distance_sq(p) <= self.radius * self.radius
    }
}
