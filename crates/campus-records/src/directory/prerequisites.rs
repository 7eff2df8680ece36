//! Prerequisite relation between courses, kept acyclic.

use std::collections::{BTreeMap, BTreeSet};

use super::domain::Course;
use crate::ids::CourseId;

/// Adjacency view of course -> direct prerequisites.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteGraph {
    edges: BTreeMap<CourseId, BTreeSet<CourseId>>,
}

impl PrerequisiteGraph {
    pub fn from_courses<'a>(courses: impl IntoIterator<Item = &'a Course>) -> Self {
        let edges = courses
            .into_iter()
            .map(|course| (course.id, course.prerequisites.clone()))
            .collect();
        Self { edges }
    }

    pub fn add(&mut self, course: CourseId, prerequisite: CourseId) {
        self.edges.entry(course).or_default().insert(prerequisite);
    }

    pub fn direct(&self, course: CourseId) -> impl Iterator<Item = CourseId> + '_ {
        self.edges.get(&course).into_iter().flatten().copied()
    }

    /// Every course reachable through prerequisite edges, excluding `course` itself
    /// unless the graph already loops back to it.
    pub fn closure(&self, course: CourseId) -> BTreeSet<CourseId> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<CourseId> = self.direct(course).collect();

        while let Some(next) = pending.pop() {
            if seen.insert(next) {
                pending.extend(self.direct(next));
            }
        }

        seen
    }

    /// Adding `course -> prerequisite` closes a loop when `course` is already required,
    /// directly or transitively, by `prerequisite`.
    pub fn would_cycle(&self, course: CourseId, prerequisite: CourseId) -> bool {
        course == prerequisite || self.closure(prerequisite).contains(&course)
    }
}
