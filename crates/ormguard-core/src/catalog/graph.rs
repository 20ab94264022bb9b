//! Relationship graph.
//!
//! Built once from the registered relations. Every relation contributes a
//! forward edge on its parent (has-one / has-many) and a derived belongs-to
//! edge on its child, both resolving through the same join pairs. The graph
//! is immutable after construction, so readers never need a lock.

use std::collections::{HashMap, HashSet};

use super::{Cardinality, Catalog, DeleteBehavior, EntityDef, RelationDef};
use crate::error::ConfigError;

/// Direction of an edge, seen from its source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Parent side of a one-to-one relation.
    HasOne,
    /// Parent side of a one-to-many relation.
    HasMany,
    /// Child side of any relation.
    BelongsTo,
}

/// A traversable edge from one entity to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge name, unique among the source entity's fields and edges.
    pub name: String,
    /// Relation this edge was derived from.
    pub relation: String,
    /// Edge direction.
    pub kind: EdgeKind,
    /// Entity the edge starts at.
    pub source: String,
    /// Entity the edge leads to.
    pub target: String,
    /// Join fields on the source, paired positionally with `target_fields`.
    pub source_fields: Vec<String>,
    /// Join fields on the target.
    pub target_fields: Vec<String>,
    /// Delete policy of the relation.
    pub on_delete: DeleteBehavior,
    /// Whether the relation is a declared foreign key.
    pub foreign_key: bool,
}

impl Edge {
    /// Whether deleting a source row affects target rows through this edge.
    pub fn is_dependent(&self) -> bool {
        self.kind != EdgeKind::BelongsTo
    }
}

/// Validated, read-only relationship graph.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    relations: Vec<RelationDef>,
    edges: HashMap<String, Vec<Edge>>,
}

impl RelationGraph {
    /// Validate relations against the catalog and build the graph.
    ///
    /// Fails on unknown entities or fields, incompatible join types, foreign
    /// keys that do not reference the parent's primary key, missing delete
    /// policies, name collisions, and cascade cycles.
    pub fn build(catalog: &Catalog, relations: &[RelationDef]) -> Result<Self, ConfigError> {
        let mut graph = RelationGraph::default();
        let mut names = HashSet::new();

        for relation in relations {
            if relation.name.is_empty() || !names.insert(relation.name.as_str()) {
                return Err(ConfigError::DuplicateRelation {
                    entity: relation.parent.clone(),
                    name: relation.name.clone(),
                });
            }

            let on_delete = validate_relation(catalog, relation)?;
            let forward = Edge {
                name: relation.name.clone(),
                relation: relation.name.clone(),
                kind: match relation.cardinality {
                    Cardinality::OneToOne => EdgeKind::HasOne,
                    Cardinality::OneToMany => EdgeKind::HasMany,
                },
                source: relation.parent.clone(),
                target: relation.child.clone(),
                source_fields: relation.parent_fields(),
                target_fields: relation.child_fields(),
                on_delete,
                foreign_key: relation.foreign_key,
            };
            let backward = Edge {
                name: relation.inverse_name(),
                relation: relation.name.clone(),
                kind: EdgeKind::BelongsTo,
                source: relation.child.clone(),
                target: relation.parent.clone(),
                source_fields: relation.child_fields(),
                target_fields: relation.parent_fields(),
                on_delete,
                foreign_key: relation.foreign_key,
            };

            graph.add_edge(catalog, forward)?;
            graph.add_edge(catalog, backward)?;
            graph.relations.push(relation.clone());
        }

        graph.check_cascade_cycles(catalog)?;
        Ok(graph)
    }

    fn add_edge(&mut self, catalog: &Catalog, edge: Edge) -> Result<(), ConfigError> {
        let clashes_field = catalog
            .entity(&edge.source)
            .map(|def| def.get_field(&edge.name).is_some() || def.is_version_field(&edge.name))
            .unwrap_or(false);
        let edges = self.edges.entry(edge.source.clone()).or_default();
        if clashes_field || edges.iter().any(|e| e.name == edge.name) {
            return Err(ConfigError::DuplicateRelation {
                entity: edge.source,
                name: edge.name,
            });
        }
        edges.push(edge);
        Ok(())
    }

    /// All edges leaving an entity.
    pub fn edges(&self, entity: &str) -> &[Edge] {
        self.edges.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Look up an edge of an entity by name.
    pub fn edge(&self, entity: &str, name: &str) -> Option<&Edge> {
        self.edges(entity).iter().find(|e| e.name == name)
    }

    /// Edges whose target rows depend on rows of `entity`.
    pub fn dependents<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges(entity).iter().filter(|e| e.is_dependent())
    }

    /// Foreign-key edges from `entity` to the rows it references.
    pub fn foreign_keys<'a>(&'a self, entity: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges(entity)
            .iter()
            .filter(|e| e.kind == EdgeKind::BelongsTo && e.foreign_key)
    }

    /// Registered relations, in declaration order.
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    /// Look up a relation by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Reject any entity that cascades into itself, directly or transitively.
    fn check_cascade_cycles(&self, catalog: &Catalog) -> Result<(), ConfigError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a RelationGraph,
            entity: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Result<(), ConfigError> {
            match marks.get(entity) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|e| *e == entity).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(|e| e.to_string()).collect();
                    cycle.push(entity.to_string());
                    return Err(ConfigError::CascadeCycle { path: cycle });
                }
                None => {}
            }

            marks.insert(entity, Mark::Visiting);
            path.push(entity);
            for edge in graph
                .dependents(entity)
                .filter(|e| e.on_delete == DeleteBehavior::Cascade)
            {
                visit(graph, &edge.target, marks, path)?;
            }
            path.pop();
            marks.insert(entity, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        for def in catalog.entities() {
            visit(self, &def.name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }
}

fn validate_relation(catalog: &Catalog, relation: &RelationDef) -> Result<DeleteBehavior, ConfigError> {
    let parent = relation_entity(catalog, relation, &relation.parent)?;
    let child = relation_entity(catalog, relation, &relation.child)?;

    if relation.join.is_empty() {
        return Err(ConfigError::EmptyJoin {
            relation: relation.name.clone(),
        });
    }

    for pair in &relation.join {
        let field = |def: &EntityDef, name: &str| {
            def.get_field(name)
                .map(|f| f.field_type.storage_type())
                .ok_or_else(|| ConfigError::UnknownRelationField {
                    relation: relation.name.clone(),
                    entity: def.name.clone(),
                    field: name.to_string(),
                })
        };
        let parent_type = field(parent, &pair.parent_field)?;
        let child_type = field(child, &pair.child_field)?;
        if !parent_type.joinable_with(&child_type) {
            return Err(ConfigError::JoinTypeMismatch {
                relation: relation.name.clone(),
                parent_field: pair.parent_field.clone(),
                child_field: pair.child_field.clone(),
            });
        }
    }

    if relation.foreign_key {
        if !same_fields(&relation.parent_fields(), &parent.primary_key) {
            return Err(ConfigError::ForeignKeyNotPrimary {
                relation: relation.name.clone(),
                parent: parent.name.clone(),
            });
        }
        if relation.cardinality == Cardinality::OneToOne
            && !same_fields(&relation.child_fields(), &child.primary_key)
        {
            return Err(ConfigError::OneToOneNotUnique {
                relation: relation.name.clone(),
                child: child.name.clone(),
            });
        }
    }

    relation.on_delete.ok_or_else(|| ConfigError::MissingDeletePolicy {
        relation: relation.name.clone(),
    })
}

fn relation_entity<'a>(
    catalog: &'a Catalog,
    relation: &RelationDef,
    name: &str,
) -> Result<&'a EntityDef, ConfigError> {
    catalog.entity(name).map_err(|_| ConfigError::UnknownRelationEntity {
        relation: relation.name.clone(),
        entity: name.to_string(),
    })
}

fn same_fields(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|f| b.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, ScalarType};

    fn entity(name: &str, fields: &[&str]) -> EntityDef {
        fields.iter().fold(EntityDef::new(name, "id"), |def, f| {
            def.with_field(FieldDef::scalar(*f, ScalarType::Int32))
        })
    }

    fn catalog() -> Catalog {
        Catalog::build(&[
            entity("Student", &["id"]),
            entity("Email", &["id", "student_id"]),
            entity("Teacher", &["id"]),
            entity("Club", &["id", "teacher_id"]),
        ])
        .unwrap()
    }

    fn emails() -> RelationDef {
        RelationDef::one_to_many("emails", "Student", "id", "Email", "student_id")
            .with_on_delete(DeleteBehavior::Cascade)
    }

    #[test]
    fn test_edges_in_both_directions() {
        let graph = RelationGraph::build(&catalog(), &[emails()]).unwrap();

        let forward = graph.edge("Student", "emails").unwrap();
        assert_eq!(forward.kind, EdgeKind::HasMany);
        assert_eq!(forward.target, "Email");
        assert_eq!(forward.target_fields, vec!["student_id".to_string()]);

        let back = graph.edge("Email", "student").unwrap();
        assert_eq!(back.kind, EdgeKind::BelongsTo);
        assert_eq!(back.target, "Student");
        assert_eq!(back.source_fields, vec!["student_id".to_string()]);
        assert_eq!(back.target_fields, vec!["id".to_string()]);

        assert_eq!(graph.dependents("Student").count(), 1);
        assert_eq!(graph.dependents("Email").count(), 0);
        assert_eq!(graph.foreign_keys("Email").count(), 1);
    }

    #[test]
    fn test_custom_join_is_not_a_foreign_key() {
        let club = RelationDef::one_to_one("club", "Teacher", "id", "Club", "teacher_id")
            .without_foreign_key()
            .with_on_delete(DeleteBehavior::Restrict);
        let graph = RelationGraph::build(&catalog(), &[club]).unwrap();

        assert_eq!(graph.foreign_keys("Club").count(), 0);
        assert_eq!(graph.edge("Teacher", "club").unwrap().kind, EdgeKind::HasOne);
        assert!(graph.edge("Club", "teacher").is_some());
    }

    #[test]
    fn test_missing_policy() {
        let rel = RelationDef::one_to_many("emails", "Student", "id", "Email", "student_id");
        let err = RelationGraph::build(&catalog(), &[rel]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingDeletePolicy {
                relation: "emails".into()
            }
        );
    }

    #[test]
    fn test_unknown_field_and_entity() {
        let rel = RelationDef::one_to_many("emails", "Student", "id", "Email", "owner_id")
            .with_on_delete(DeleteBehavior::Cascade);
        assert!(matches!(
            RelationGraph::build(&catalog(), &[rel]).unwrap_err(),
            ConfigError::UnknownRelationField { .. }
        ));

        let rel = RelationDef::one_to_many("posts", "Student", "id", "Post", "student_id")
            .with_on_delete(DeleteBehavior::Cascade);
        assert!(matches!(
            RelationGraph::build(&catalog(), &[rel]).unwrap_err(),
            ConfigError::UnknownRelationEntity { .. }
        ));
    }

    #[test]
    fn test_foreign_key_rules() {
        let rel = RelationDef::one_to_many("by_teacher", "Club", "teacher_id", "Email", "student_id")
            .with_on_delete(DeleteBehavior::Restrict);
        assert!(matches!(
            RelationGraph::build(&catalog(), &[rel]).unwrap_err(),
            ConfigError::ForeignKeyNotPrimary { .. }
        ));

        let rel = RelationDef::one_to_one("club", "Teacher", "id", "Club", "teacher_id")
            .with_on_delete(DeleteBehavior::Restrict);
        assert!(matches!(
            RelationGraph::build(&catalog(), &[rel]).unwrap_err(),
            ConfigError::OneToOneNotUnique { .. }
        ));
    }

    #[test]
    fn test_name_collisions() {
        let dup = emails().with_inverse("student_id");
        assert!(matches!(
            RelationGraph::build(&catalog(), &[dup]).unwrap_err(),
            ConfigError::DuplicateRelation { .. }
        ));

        assert!(matches!(
            RelationGraph::build(&catalog(), &[emails(), emails()]).unwrap_err(),
            ConfigError::DuplicateRelation { .. }
        ));
    }

    #[test]
    fn test_cascade_cycle() {
        let a = RelationDef::one_to_many("clubs", "Teacher", "id", "Club", "teacher_id")
            .with_on_delete(DeleteBehavior::Cascade);
        let b = RelationDef::one_to_many("teachers", "Club", "id", "Teacher", "id")
            .with_inverse("owner")
            .with_on_delete(DeleteBehavior::Cascade);
        let err = RelationGraph::build(&catalog(), &[a.clone(), b.clone()]).unwrap_err();
        match err {
            ConfigError::CascadeCycle { path } => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"Teacher".to_string()));
                assert!(path.contains(&"Club".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        let b = b.with_on_delete(DeleteBehavior::Restrict);
        assert!(RelationGraph::build(&catalog(), &[a, b]).is_ok());
    }

    #[test]
    fn test_self_cascade() {
        let rel = RelationDef::one_to_many("replies", "Email", "id", "Email", "student_id")
            .with_inverse("parent")
            .with_on_delete(DeleteBehavior::Cascade);
        assert!(matches!(
            RelationGraph::build(&catalog(), &[rel]).unwrap_err(),
            ConfigError::CascadeCycle { .. }
        ));
    }
}
