//! Exact earth-mover (Wasserstein-1) distance between two uniform point clouds.
//!
//! Solved as a transportation problem: left point `i` supplies `m / g` units,
//! right point `j` demands `n / g` units (`g = gcd(n, m)`), ground cost is the
//! Euclidean distance. Successive shortest paths with Dijkstra over reduced
//! costs; the dense bipartite graph is walked implicitly.

use crate::records::Coord;

/// `None` when either set is empty or a distance is not finite.
pub fn earth_movers_distance(a: &[Coord], b: &[Coord]) -> Option<f64> {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return None;
    }
    let cost: Vec<f64> = a
        .iter()
        .flat_map(|p| b.iter().map(move |q| p.distance(q)))
        .collect();
    if cost.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let g = gcd(n, m);
    let mut problem = Transport::new(n, m, cost, (m / g) as u64, (n / g) as u64);
    problem.solve()?;
    let units = (n * (m / g)) as f64;
    Some(problem.total_cost() / units)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Source,
    Left(usize),
    Right(usize),
    Sink,
}

struct Transport {
    n: usize,
    m: usize,
    cost: Vec<f64>,
    flow: Vec<u64>,
    supply: Vec<u64>,
    demand: Vec<u64>,
    potential: Vec<f64>,
}

impl Transport {
    fn new(n: usize, m: usize, cost: Vec<f64>, supply: u64, demand: u64) -> Self {
        Self {
            n,
            m,
            flow: vec![0; n * m],
            cost,
            supply: vec![supply; n],
            demand: vec![demand; m],
            potential: vec![0.0; n + m + 2],
        }
    }

    fn node(&self, idx: usize) -> Node {
        match idx {
            0 => Node::Source,
            i if i <= self.n => Node::Left(i - 1),
            j if j <= self.n + self.m => Node::Right(j - 1 - self.n),
            _ => Node::Sink,
        }
    }

    fn index(&self, node: Node) -> usize {
        match node {
            Node::Source => 0,
            Node::Left(i) => 1 + i,
            Node::Right(j) => 1 + self.n + j,
            Node::Sink => 1 + self.n + self.m,
        }
    }

    fn total_cost(&self) -> f64 {
        self.flow
            .iter()
            .zip(&self.cost)
            .map(|(f, c)| *f as f64 * c)
            .sum()
    }

    /// Residual edges leaving `u` with their original costs.
    fn edges(&self, u: Node, out: &mut Vec<(Node, f64)>) {
        out.clear();
        match u {
            Node::Source => out.extend(
                (0..self.n)
                    .filter(|&i| self.supply[i] > 0)
                    .map(|i| (Node::Left(i), 0.0)),
            ),
            Node::Left(i) => out.extend((0..self.m).map(|j| (Node::Right(j), self.cost[i * self.m + j]))),
            Node::Right(j) => {
                if self.demand[j] > 0 {
                    out.push((Node::Sink, 0.0));
                }
                out.extend(
                    (0..self.n)
                        .filter(|&i| self.flow[i * self.m + j] > 0)
                        .map(|i| (Node::Left(i), -self.cost[i * self.m + j])),
                );
            }
            Node::Sink => {}
        }
    }

    /// Dijkstra over reduced costs; returns predecessor indices when the sink is reachable.
    fn shortest_path(&mut self) -> Option<Vec<usize>> {
        let v = self.n + self.m + 2;
        let sink = v - 1;
        let mut dist = vec![f64::INFINITY; v];
        let mut prev = vec![usize::MAX; v];
        let mut done = vec![false; v];
        let mut edges = Vec::with_capacity(self.n.max(self.m) + 1);
        dist[0] = 0.0;
        while let Some(u) = (0..v)
            .filter(|&x| !done[x] && dist[x].is_finite())
            .min_by(|&x, &y| dist[x].total_cmp(&dist[y]))
        {
            done[u] = true;
            self.edges(self.node(u), &mut edges);
            for &(to, c) in &edges {
                let w = self.index(to);
                if done[w] {
                    continue;
                }
                // clamp rounding noise; reduced costs are non-negative in exact arithmetic
                let reduced = (c + self.potential[u] - self.potential[w]).max(0.0);
                let nd = dist[u] + reduced;
                if nd < dist[w] {
                    dist[w] = nd;
                    prev[w] = u;
                }
            }
        }
        let reach = dist[sink];
        if !reach.is_finite() {
            return None;
        }
        for (p, d) in self.potential.iter_mut().zip(&dist) {
            *p += d.min(reach);
        }
        Some(prev)
    }

    fn solve(&mut self) -> Option<()> {
        let sink = self.index(Node::Sink);
        while self.supply.iter().any(|&s| s > 0) {
            let prev = self.shortest_path()?;

            let mut push = u64::MAX;
            let mut x = sink;
            while x != 0 {
                let p = prev[x];
                match (self.node(p), self.node(x)) {
                    (Node::Source, Node::Left(i)) => push = push.min(self.supply[i]),
                    (Node::Right(j), Node::Left(i)) => push = push.min(self.flow[i * self.m + j]),
                    (Node::Right(j), Node::Sink) => push = push.min(self.demand[j]),
                    _ => {}
                }
                x = p;
            }

            let mut x = sink;
            while x != 0 {
                let p = prev[x];
                match (self.node(p), self.node(x)) {
                    (Node::Source, Node::Left(i)) => self.supply[i] -= push,
                    (Node::Left(i), Node::Right(j)) => self.flow[i * self.m + j] += push,
                    (Node::Right(j), Node::Left(i)) => self.flow[i * self.m + j] -= push,
                    (Node::Right(j), Node::Sink) => self.demand[j] -= push,
                    _ => {}
                }
                x = p;
            }
        }
        Some(())
    }
}
