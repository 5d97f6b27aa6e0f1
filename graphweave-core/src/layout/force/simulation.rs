//! Force simulation.
//!
//! A velocity-Verlet style integrator with four forces:
//!
//! - many-body repulsion between every pair of nodes, clamped to
//!   `[n_body_distance_min, n_body_distance_max]`
//! - link springs pulling connected nodes towards `link_distance`
//! - a centering force keeping the centroid at the origin
//! - optional collision separation with a fixed radius
//!
//! `alpha` (the temperature) decays each tick towards zero; the simulation
//! has converged once it drops below `alpha_min`. Nodes with `fx`/`fy` are
//! pinned. The whole module is pure and deterministic so it can run on any
//! thread.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::graph::Id;
use crate::layout::Position;

const INITIAL_RADIUS: f64 = 10.0;
const TICK_LIMIT: usize = 10_000;

/// Tunables of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    pub alpha: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    pub n_body_strength: f64,
    pub n_body_distance_min: f64,
    pub n_body_distance_max: f64,
    pub link_distance: f64,
    pub collision_radius: f64,
    pub ticks_per_update: usize,
}

/// A node as seen by the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimNode {
    pub id: Id,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

/// A link between two node ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimLink {
    pub source: Id,
    pub target: Id,
}

/// Everything a worker needs to run a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub generation: u64,
    pub nodes: Vec<SimNode>,
    pub links: Vec<SimLink>,
    pub params: SimulationParams,
}

#[derive(Debug, Clone)]
struct Body {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    fx: Option<f64>,
    fy: Option<f64>,
}

#[derive(Debug, Clone)]
struct Spring {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

/// Deterministic jitter source used to separate coincident nodes.
#[derive(Debug, Clone)]
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f64 {
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 4_294_967_296;
        self.0 = (A * self.0 + C) % M;
        self.0 as f64 / M as f64
    }

    fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

/// A running simulation.
#[derive(Debug, Clone)]
pub struct Simulation {
    ids: Vec<Id>,
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    params: SimulationParams,
    alpha: f64,
    ticks: usize,
    random: Lcg,
}

impl Simulation {
    /// Build a simulation. Nodes without a position are seeded on a
    /// phyllotaxis spiral; links to unknown ids are ignored.
    pub fn new(request: SimulationRequest) -> Self {
        let SimulationRequest {
            nodes,
            links,
            params,
            ..
        } = request;

        let initial_angle = PI * (3.0 - 5f64.sqrt());
        let mut index_of = HashMap::with_capacity(nodes.len());
        let mut ids = Vec::with_capacity(nodes.len());
        let mut bodies = Vec::with_capacity(nodes.len());

        for (i, node) in nodes.into_iter().enumerate() {
            let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
            let angle = i as f64 * initial_angle;
            let x = node.fx.or(node.x).unwrap_or(radius * angle.cos());
            let y = node.fy.or(node.y).unwrap_or(radius * angle.sin());
            index_of.insert(node.id.clone(), i);
            ids.push(node.id);
            bodies.push(Body {
                x,
                y,
                vx: 0.0,
                vy: 0.0,
                fx: node.fx,
                fy: node.fy,
            });
        }

        let resolved: Vec<(usize, usize)> = links
            .iter()
            .filter_map(|link| Some((*index_of.get(&link.source)?, *index_of.get(&link.target)?)))
            .collect();

        let mut count = vec![0usize; bodies.len()];
        for &(source, target) in &resolved {
            count[source] += 1;
            count[target] += 1;
        }

        let springs = resolved
            .into_iter()
            .map(|(source, target)| {
                let (cs, ct) = (count[source] as f64, count[target] as f64);
                Spring {
                    source,
                    target,
                    strength: 1.0 / cs.min(ct),
                    bias: cs / (cs + ct),
                }
            })
            .collect();

        Self {
            ids,
            bodies,
            springs,
            alpha: params.alpha,
            params,
            ticks: 0,
            random: Lcg(1),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn is_converged(&self) -> bool {
        self.alpha < self.params.alpha_min || self.ticks >= TICK_LIMIT || self.bodies.is_empty()
    }

    /// Advance by one step.
    pub fn tick(&mut self) {
        self.alpha += (0.0 - self.alpha) * self.params.alpha_decay;
        self.ticks += 1;

        self.apply_springs();
        self.apply_many_body();
        if self.params.collision_radius > 0.0 {
            self.apply_collision();
        }

        let retain = 1.0 - self.params.velocity_decay;
        for body in &mut self.bodies {
            match body.fx {
                Some(fx) => {
                    body.x = fx;
                    body.vx = 0.0;
                }
                None => {
                    body.vx *= retain;
                    body.x += body.vx;
                }
            }
            match body.fy {
                Some(fy) => {
                    body.y = fy;
                    body.vy = 0.0;
                }
                None => {
                    body.vy *= retain;
                    body.y += body.vy;
                }
            }
        }

        self.apply_center();
    }

    /// Current positions, by id.
    pub fn positions(&self) -> Vec<(Id, Position)> {
        self.ids
            .iter()
            .zip(&self.bodies)
            .map(|(id, body)| (id.clone(), [body.x, body.y]))
            .collect()
    }

    fn apply_springs(&mut self) {
        let alpha = self.alpha;
        let distance = self.params.link_distance;
        for spring in &self.springs {
            let (s, t) = (&self.bodies[spring.source], &self.bodies[spring.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            let mut y = t.y + t.vy - s.y - s.vy;
            if x == 0.0 {
                x = self.random.jiggle();
            }
            if y == 0.0 {
                y = self.random.jiggle();
            }
            let length = (x * x + y * y).sqrt();
            let l = (length - distance) / length * alpha * spring.strength;
            let (x, y) = (x * l, y * l);

            let target = &mut self.bodies[spring.target];
            target.vx -= x * spring.bias;
            target.vy -= y * spring.bias;
            let source = &mut self.bodies[spring.source];
            source.vx += x * (1.0 - spring.bias);
            source.vy += y * (1.0 - spring.bias);
        }
    }

    fn apply_many_body(&mut self) {
        let strength = self.params.n_body_strength * self.alpha;
        let min2 = self.params.n_body_distance_min.powi(2);
        let max2 = self.params.n_body_distance_max.powi(2);
        let n = self.bodies.len();

        let mut deltas = vec![(0.0, 0.0); n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut x = self.bodies[j].x - self.bodies[i].x;
                let mut y = self.bodies[j].y - self.bodies[i].y;
                let mut l = x * x + y * y;
                if l >= max2 {
                    continue;
                }
                if x == 0.0 {
                    x = self.random.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.random.jiggle();
                    l += y * y;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                let w = strength / l;
                deltas[i].0 += x * w;
                deltas[i].1 += y * w;
            }
        }

        for (body, (dx, dy)) in self.bodies.iter_mut().zip(deltas) {
            body.vx += dx;
            body.vy += dy;
        }
    }

    fn apply_collision(&mut self) {
        let radius = self.params.collision_radius;
        let reach = 2.0 * radius;
        let n = self.bodies.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (a, b) = (&self.bodies[i], &self.bodies[j]);
                let mut x = (a.x + a.vx) - (b.x + b.vx);
                let mut y = (a.y + a.vy) - (b.y + b.vy);
                let mut l = x * x + y * y;
                if l >= reach * reach {
                    continue;
                }
                if x == 0.0 {
                    x = self.random.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.random.jiggle();
                    l += y * y;
                }
                let length = l.sqrt();
                let push = (reach - length) / length * 0.5;
                let (x, y) = (x * push, y * push);
                self.bodies[i].vx += x;
                self.bodies[i].vy += y;
                self.bodies[j].vx -= x;
                self.bodies[j].vy -= y;
            }
        }
    }

    fn apply_center(&mut self) {
        let free: Vec<usize> = (0..self.bodies.len())
            .filter(|&i| self.bodies[i].fx.is_none() && self.bodies[i].fy.is_none())
            .collect();
        if free.is_empty() {
            return;
        }
        let n = free.len() as f64;
        let (sx, sy) = free.iter().fold((0.0, 0.0), |(sx, sy), &i| {
            (sx + self.bodies[i].x, sy + self.bodies[i].y)
        });
        let (sx, sy) = (sx / n, sy / n);
        for i in free {
            self.bodies[i].x -= sx;
            self.bodies[i].y -= sy;
        }
    }
}
