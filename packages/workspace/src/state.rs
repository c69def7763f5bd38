//! # Project State
//!
//! The single handle an editing session holds: loaded layer documents, the
//! composed hierarchy, the history graph, the staging area and the current
//! user. Every mutating operation follows the same cycle:
//!
//! 1. check the guard (role, ownership, conflicts)
//! 2. edit the source document text in place
//! 3. recompose the hierarchy
//! 4. stage or log the change
//! 5. notify observers with a [`ChangeSet`]
//!
//! Property edits, renames, additions and removals are staged until
//! [`ProjectState::commit`]. Status promotions are logged immediately.

use crate::config::{ProjectConfig, DEFAULT_CONFIG_NAME};
use crate::error::{WorkspaceError, WorkspaceResult};
use crate::observer::{ChangeSet, StateObserver};
use crate::rebuild::OutlineRebuild;
use stagehand_common::{Classify, DocumentStore, ErrorKind, RealFileSystem, Warning, Warnings};
use stagehand_editor::{
    reconcile_placeholder, retarget_references, ChangeKind, ChangePayload, EditError,
    LayerDocument, Mutation, PlaceholderDecision, StagedChange, StagingArea,
};
use stagehand_governance::{
    check_layer_permission, check_permission, plan_layers, plan_objects, request_write, set_administrative,
    ApprovedWrite, Direction, PendingWrite, PermissionDecision, Resolution, Role, User,
    WriteIntent, WriteRequest,
};
use stagehand_history::{append_to_log, reconstruct_at, History, LogEntry, NewEntry, Reconstruction};
use stagehand_parser::ast::{Prim, PropertyType, SceneDocument, STATUS_KEY};
use stagehand_parser::serializer::DOCUMENT_HEADER;
use stagehand_parser::{parse_prim_block, prim_path, Serializer};
use stagehand_stage::resolver::{normalize, resolve_asset_path};
use stagehand_stage::{ComposedHierarchy, Composer, Layer, LayerSource, LayerStatus};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a property write
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyChange {
    Applied(ChangeSet),
    Denied(PermissionDecision),
    /// Another owner holds an opinion; answer with [`ProjectState::resolve_pending`]
    NeedsResolution(PendingWrite),
}

/// Entries written by a commit
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub entries: Vec<LogEntry>,
    pub warnings: Warnings,
}

pub struct ProjectState {
    config: ProjectConfig,
    store: Box<dyn DocumentStore>,
    /// Layer documents keyed by their file path in the stack
    documents: BTreeMap<String, LayerDocument>,
    /// Non-layer documents reached through references and payloads
    referenced: BTreeMap<String, LayerDocument>,
    change_log: LayerDocument,
    composer: Composer,
    hierarchy: ComposedHierarchy,
    history: History,
    staging: StagingArea,
    current_user: Option<User>,
    observers: Vec<Box<dyn StateObserver>>,
    /// Layer descriptors changed since the last save
    config_dirty: bool,
}

impl ProjectState {
    /// Load every layer of `config` from `store` and compose them
    ///
    /// A missing layer document is an error; a missing change log starts
    /// empty.
    pub fn open(store: Box<dyn DocumentStore>, config: ProjectConfig) -> WorkspaceResult<Self> {
        let mut documents = BTreeMap::new();
        for layer in &config.layers {
            let doc = LayerDocument::load(store.as_ref(), &layer.file_path)?;
            documents.insert(layer.file_path.clone(), doc);
        }

        let change_log = if store.exists(&config.change_log_file) {
            LayerDocument::load(store.as_ref(), &config.change_log_file)?
        } else {
            debug!(file = %config.change_log_file, "Starting a new change log");
            LayerDocument::from_source(
                config.change_log_file.clone(),
                format!("{}\n", DOCUMENT_HEADER),
            )?
        };
        let history = History::from_document(&change_log.parse()?)?;

        let referenced = load_referenced(store.as_ref(), &documents);
        let mut composer = Composer::new();
        for (path, doc) in &referenced {
            composer.add_document(path.clone(), doc.parse()?);
        }

        let mut state = Self {
            config,
            store,
            documents,
            referenced,
            change_log,
            composer,
            hierarchy: ComposedHierarchy::default(),
            history,
            staging: StagingArea::new(),
            current_user: None,
            observers: Vec::new(),
            config_dirty: false,
        };
        state.recompose();

        info!(
            layers = state.config.layers.len(),
            entries = state.history.len(),
            prims = state.hierarchy.flatten().len(),
            "Project opened"
        );
        Ok(state)
    }

    /// Open a project directory through its `stagehand.config.json`
    pub fn open_dir(dir: &Path) -> WorkspaceResult<Self> {
        let config = ProjectConfig::load(dir)?;
        Self::open(Box::new(RealFileSystem::new(dir)), config)
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn layers(&self) -> &[Layer] {
        &self.config.layers
    }

    pub fn hierarchy(&self) -> &ComposedHierarchy {
        &self.hierarchy
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn staged(&self) -> &[StagedChange] {
        self.staging.changes()
    }

    pub fn document(&self, file_path: &str) -> Option<&LayerDocument> {
        self.documents.get(file_path)
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn change_log(&self) -> &LayerDocument {
        &self.change_log
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn set_current_user(&mut self, name: &str) -> WorkspaceResult<()> {
        let user = self
            .config
            .find_user(name)
            .cloned()
            .ok_or_else(|| WorkspaceError::UnknownUser(name.to_string()))?;
        info!(user = %user.name, role = %user.role, "Current user set");
        self.current_user = Some(user);
        Ok(())
    }

    pub fn subscribe(&mut self, observer: impl StateObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Chunked outline rebuild sized from the config
    pub fn outline_rebuild(&self) -> OutlineRebuild {
        OutlineRebuild::new(self.config.rebuild_chunk_size)
    }

    /// Rebuild the composed hierarchy from the current document texts
    pub fn recompose(&mut self) {
        let sources: Vec<LayerSource> = self
            .config
            .layers
            .iter()
            .filter_map(|layer| {
                self.documents
                    .get(&layer.file_path)
                    .map(|doc| LayerSource::new(layer.clone(), doc.source()))
            })
            .collect();
        self.hierarchy = self.composer.compose(&sources);
    }

    // ---- property writes ----

    /// Write one property through the guard
    pub fn apply_property_change(&mut self, intent: WriteIntent) -> WorkspaceResult<PropertyChange> {
        let user = self.user()?;
        match request_write(&user, intent, &self.hierarchy, &self.config.layers)? {
            WriteRequest::Clear(approved) => Ok(PropertyChange::Applied(self.write_property(approved)?)),
            WriteRequest::Denied(decision) => Ok(PropertyChange::Denied(decision)),
            WriteRequest::NeedsResolution(pending) => {
                info!(
                    path = %pending.intent.path,
                    property = %pending.intent.property,
                    owners = pending.conflict.conflicting_layers.len(),
                    "Write waiting for conflict resolution"
                );
                Ok(PropertyChange::NeedsResolution(pending))
            }
        }
    }

    /// Finish a conflicting write; `None` when the user kept the current value
    pub fn resolve_pending(
        &mut self,
        pending: PendingWrite,
        resolution: Resolution,
    ) -> WorkspaceResult<Option<ChangeSet>> {
        match pending.resolve(resolution)? {
            Some(approved) => Ok(Some(self.write_property(approved)?)),
            None => Ok(None),
        }
    }

    fn write_property(&mut self, approved: ApprovedWrite) -> WorkspaceResult<ChangeSet> {
        let intent = approved.intent;
        let (document, source_path) = self.source_of(&intent.path)?;
        let previous_status = self
            .hierarchy
            .find(&intent.path)
            .and_then(|p| p.status())
            .map(str::to_string);

        self.document_mut(&document)?.apply(&Mutation::SetProperty {
            path: source_path,
            name: intent.property.clone(),
            value: intent.value.clone(),
            value_type: intent.value_type,
        })?;
        self.recompose();

        let snapshot = self.hierarchy.find(&intent.path).cloned();
        let value = snapshot
            .as_ref()
            .and_then(|p| p.property(&intent.property))
            .map(|p| p.value.clone());
        let is_status = intent.property == STATUS_KEY;
        let kind = if is_status {
            ChangeKind::SetStatus
        } else {
            ChangeKind::SetProperty
        };

        self.staging.stage(StagedChange::new(kind, intent.path.as_str()).with_payload(
            ChangePayload {
                layer: Some(document.clone()),
                paths: vec![intent.path.clone()],
                property: Some(intent.property.clone()),
                value,
                source_status: previous_status.filter(|_| is_status),
                target_status: is_status.then(|| intent.value.clone()),
                previous_path: None,
                snapshot,
                overridden: approved.overridden,
            },
        ));
        info!(
            user = %approved.user.name,
            path = %intent.path,
            property = %intent.property,
            overridden = approved.overridden,
            "Property written"
        );

        let mut change = ChangeSet::new();
        change.touch_path(intent.path);
        change.touch_document(document);
        Ok(self.finish(change))
    }

    // ---- structural edits ----

    /// Rename the prim at composed `path`; references in every layer follow
    pub fn rename_prim(&mut self, path: &str, new_name: &str) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        let (document, source_path) = self.source_of(path)?;
        self.ensure_layer_permission(&user, &document)?;

        let result = self.document_mut(&document)?.apply(&Mutation::RenamePrim {
            path: source_path.clone(),
            new_name: new_name.to_string(),
        })?;
        let new_source_path = sibling_path(&source_path, new_name);
        let new_path = sibling_path(path, new_name);

        let mut change = ChangeSet::new();
        change.touch_document(document.clone());
        for retargeted in self.retarget_all(&document, &source_path, &new_source_path) {
            change.touch_document(retargeted);
        }
        self.recompose();

        for (old, new) in &result.renamed {
            let old = prim_path::rebase(old, &source_path, path).unwrap_or_else(|| old.clone());
            let new = prim_path::rebase(new, &new_source_path, &new_path)
                .unwrap_or_else(|| new.clone());
            change.touch_path(new.clone());
            change.renamed.push((old, new));
        }

        self.staging.stage(
            StagedChange::new(ChangeKind::RenamePrim, new_path.as_str()).with_payload(
                ChangePayload {
                    layer: Some(document),
                    paths: vec![path.to_string(), new_path.clone()],
                    previous_path: Some(path.to_string()),
                    snapshot: self.hierarchy.find(&new_path).cloned(),
                    ..ChangePayload::default()
                },
            ),
        );
        info!(user = %user.name, from = %path, to = %new_path, "Prim renamed");
        Ok(self.finish(change))
    }

    /// Point arcs aimed at the renamed prim in `renamed_doc` at its new path,
    /// in layer and referenced documents alike
    fn retarget_all(&mut self, renamed_doc: &str, old: &str, new: &str) -> Vec<String> {
        let target = normalize(renamed_doc);
        let mut touched = Vec::new();

        for (name, doc) in self.documents.iter_mut().chain(self.referenced.iter_mut()) {
            if retarget_document(name, doc, &target, old, new) {
                touched.push(name.clone());
            }
        }

        for name in &touched {
            if let Some(doc) = self.referenced.get(name) {
                match doc.parse() {
                    Ok(parsed) => self.composer.add_document(name.clone(), parsed),
                    Err(e) => warn!(document = %name, error = %e, "Retargeted document does not parse"),
                }
            }
        }
        touched
    }

    /// Add the prims of `block` under `parent_path` in layer `layer_id`
    ///
    /// A real prim landing on a placeholder replaces it, keeping the
    /// placeholder's extra properties and children; a placeholder landing
    /// on a real prim is skipped with a warning. Either every prim lands or
    /// no document changes.
    pub fn add_prim(
        &mut self,
        layer_id: &str,
        parent_path: &str,
        block: &str,
    ) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        let layer = self.layer(layer_id)?.clone();
        let decision = check_layer_permission(&user, &layer);
        if !decision.allowed {
            return Err(WorkspaceError::PermissionDenied(decision.reason));
        }
        let document = layer.file_path;

        let source_parent = if prim_path::is_root(parent_path) {
            parent_path.to_string()
        } else {
            match self.hierarchy.find(parent_path).and_then(|p| p.source.as_ref()) {
                Some(source) if source.document == document => source.path.clone(),
                _ => parent_path.to_string(),
            }
        };
        let incoming = parse_prim_block(block, parent_path)
            .map_err(|e| EditError::InvalidBlock(e.to_string()))?;

        let mut working = BTreeMap::new();
        let mut change = ChangeSet::new();
        let mut added = Vec::new();
        for prim in incoming {
            let path = prim.path.clone();
            let existing = self.authored_prim(&path);
            let prim = match reconcile_placeholder(existing.as_ref(), prim) {
                PlaceholderDecision::Insert(prim) => prim,
                PlaceholderDecision::Replace(prim) => {
                    if let Some(source) = self.hierarchy.find(&path).and_then(|p| p.source.clone()) {
                        if self.documents.contains_key(&source.document) {
                            self.working_copy(&mut working, &source.document)?
                                .apply(&Mutation::RemovePrim { path: source.path })?;
                            change.touch_document(source.document);
                        }
                    }
                    info!(path = %path, "Placeholder replaced by real element");
                    prim
                }
                PlaceholderDecision::Skip(warning) => {
                    warn!(path = %path, "Placeholder skipped");
                    change.warnings.push(warning);
                    continue;
                }
            };

            let mut text = String::new();
            Serializer::new().serialize_prim(&prim, &mut text);
            self.working_copy(&mut working, &document)?
                .apply(&Mutation::InsertPrim {
                    parent_path: source_parent.clone(),
                    block: text,
                })?;
            change.touch_document(document.clone());
            added.push(path);
        }
        self.documents.extend(working);

        if added.is_empty() {
            return Ok(self.finish(change));
        }
        self.recompose();

        for path in added {
            let snapshot = self.hierarchy.find(&path).cloned();
            self.staging.stage(
                StagedChange::new(ChangeKind::AddPrim, path.as_str()).with_payload(ChangePayload {
                    layer: Some(document.clone()),
                    paths: vec![path.clone()],
                    snapshot,
                    ..ChangePayload::default()
                }),
            );
            change.touch_path(path);
        }
        info!(user = %user.name, layer = %layer_id, added = change.affected_paths.len(), "Prims added");
        Ok(self.finish(change))
    }

    /// Remove the prim at composed `path` from the layer that defines it
    pub fn remove_prim(&mut self, path: &str) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        let (document, source_path) = self.source_of(path)?;
        self.ensure_layer_permission(&user, &document)?;

        self.document_mut(&document)?
            .apply(&Mutation::RemovePrim { path: source_path })?;
        self.recompose();

        self.staging.stage(
            StagedChange::new(ChangeKind::RemovePrim, path).with_payload(ChangePayload {
                layer: Some(document.clone()),
                paths: vec![path.to_string()],
                ..ChangePayload::default()
            }),
        );
        info!(user = %user.name, path = %path, "Prim removed");

        let mut change = ChangeSet::new();
        change.touch_path(path);
        change.touch_document(document);
        Ok(self.finish(change))
    }

    // ---- status ----

    pub fn promote_layers(&mut self, ids: &[String]) -> WorkspaceResult<ChangeSet> {
        self.step_layers(ids, Direction::Promote)
    }

    pub fn demote_layers(&mut self, ids: &[String]) -> WorkspaceResult<ChangeSet> {
        self.step_layers(ids, Direction::Demote)
    }

    fn step_layers(&mut self, ids: &[String], direction: Direction) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        if user.role.is_read_only() {
            return Err(WorkspaceError::PermissionDenied(format!(
                "{} cannot change layer status",
                user.role
            )));
        }

        let mut change = ChangeSet::new();
        let mut permitted = Vec::new();
        for id in ids {
            match self.config.layers.iter().find(|l| &l.id == id) {
                Some(layer) => {
                    let decision = check_layer_permission(&user, layer);
                    if decision.allowed {
                        permitted.push(id.clone());
                    } else {
                        change.warnings.push(
                            Warning::new(ErrorKind::Validation, decision.reason)
                                .about(id.clone()),
                        );
                    }
                }
                // Unknown ids are reported by the planner
                None => permitted.push(id.clone()),
            }
        }

        let batch = plan_layers(&self.config.layers, &permitted, direction);
        change.warnings.extend(batch.warnings);
        let mut applied = Vec::new();
        for transition in batch.transitions {
            if let Err(e) = self.restamp_layer(&transition.file_path, transition.to, &mut change) {
                warn!(layer = %transition.layer_id, error = %e, "Layer status not changed");
                change.warnings.push(
                    Warning::new(e.kind(), e.to_string()).about(transition.layer_id.clone()),
                );
                continue;
            }
            transition.apply(&mut self.config.layers);
            applied.push(transition);
        }
        if !applied.is_empty() {
            self.config_dirty = true;
        }
        self.recompose();

        for transition in &applied {
            let paths = self.hierarchy.paths_from(&transition.file_path);
            for path in &paths {
                change.touch_path(path.clone());
            }
            let entry = NewEntry::new(status_kind(direction), user.name.as_str())
                .with_paths(paths)
                .with_statuses(
                    Some(transition.from.to_string()),
                    Some(transition.to.to_string()),
                )
                .with_message(format!("layer {}", transition.layer_id));
            self.record(entry, &mut change.warnings);
        }
        Ok(self.finish(change))
    }

    /// Rewrite the explicit statuses authored in a layer document
    ///
    /// The document is only replaced once every status is rewritten.
    fn restamp_layer(
        &mut self,
        file_path: &str,
        status: LayerStatus,
        change: &mut ChangeSet,
    ) -> WorkspaceResult<()> {
        let mut doc = self.document_mut(file_path)?.clone();
        let explicit: Vec<String> = doc
            .parse()?
            .scene_prims()
            .flat_map(|p| p.descendants())
            .filter(|p| p.has_property(STATUS_KEY))
            .map(|p| p.path.clone())
            .collect();

        for path in &explicit {
            doc.apply(&Mutation::SetProperty {
                path: path.clone(),
                name: STATUS_KEY.to_string(),
                value: status.as_str().to_string(),
                value_type: PropertyType::String,
            })?;
        }
        if !explicit.is_empty() {
            self.documents.insert(file_path.to_string(), doc);
            change.touch_document(file_path);
        }
        Ok(())
    }

    pub fn promote_objects(&mut self, paths: &[String]) -> WorkspaceResult<ChangeSet> {
        self.step_objects(paths, Direction::Promote)
    }

    pub fn demote_objects(&mut self, paths: &[String]) -> WorkspaceResult<ChangeSet> {
        self.step_objects(paths, Direction::Demote)
    }

    fn step_objects(&mut self, paths: &[String], direction: Direction) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        if user.role.is_read_only() {
            return Err(WorkspaceError::PermissionDenied(format!(
                "{} cannot change object status",
                user.role
            )));
        }

        let plan = plan_objects(&self.hierarchy, paths, direction)?;

        // The cascade may reach prims of other owners; any refusal stops the batch
        let mut denied: Vec<String> = plan
            .affected
            .iter()
            .filter_map(|path| self.hierarchy.find(path))
            .filter(|prim| {
                prim.source
                    .as_ref()
                    .map_or(false, |s| self.documents.contains_key(&s.document))
            })
            .map(|prim| check_permission(&user, prim, STATUS_KEY, &self.config.layers))
            .filter(|decision| !decision.allowed)
            .map(|decision| decision.reason)
            .collect();
        if !denied.is_empty() {
            denied.sort();
            denied.dedup();
            warn!(user = %user.name, targets = plan.targets.len(), "Object status change refused");
            return Err(WorkspaceError::PermissionDenied(denied.join("; ")));
        }

        let mut working = BTreeMap::new();
        let mut change = ChangeSet::new();
        for path in &plan.affected {
            let (document, source_path) = match self.source_of(path) {
                Ok(found) => found,
                Err(e) => {
                    warn!(path = %path, error = %e, "Status not written");
                    change
                        .warnings
                        .push(Warning::new(e.kind(), e.to_string()).about(path.clone()));
                    continue;
                }
            };
            self.working_copy(&mut working, &document)?
                .apply(&Mutation::SetProperty {
                    path: source_path,
                    name: STATUS_KEY.to_string(),
                    value: plan.to.as_str().to_string(),
                    value_type: PropertyType::String,
                })?;
            change.touch_document(document);
            change.touch_path(path.clone());
        }
        self.documents.extend(working);
        self.recompose();

        for target in &plan.targets {
            let mut entry = NewEntry::new(status_kind(direction), user.name.as_str())
                .with_path(target.clone())
                .with_statuses(Some(plan.from.to_string()), Some(plan.to.to_string()));
            if let Some(prim) = self.hierarchy.find(target) {
                entry = entry.with_snapshot(prim.clone());
            }
            self.record(entry, &mut change.warnings);
        }
        Ok(self.finish(change))
    }

    /// Set a layer's status outside the promotion chain (managers only)
    pub fn set_layer_status_admin(&mut self, layer_id: &str, status: LayerStatus) -> WorkspaceResult<ChangeSet> {
        let user = self.user()?;
        if user.role != Role::ProjectManager {
            return Err(WorkspaceError::PermissionDenied(format!(
                "{} cannot set layer status directly",
                user.role
            )));
        }

        let index = self
            .config
            .layers
            .iter()
            .position(|l| l.id == layer_id)
            .ok_or_else(|| WorkspaceError::LayerNotFound(layer_id.to_string()))?;
        let file_path = self.config.layers[index].file_path.clone();

        let mut change = ChangeSet::new();
        self.restamp_layer(&file_path, status, &mut change)?;
        let previous = set_administrative(&mut self.config.layers[index], status);
        self.config_dirty = true;
        self.recompose();

        let paths = self.hierarchy.paths_from(&file_path);
        for path in &paths {
            change.touch_path(path.clone());
        }
        let entry = NewEntry::new(ChangeKind::SetStatus, user.name.as_str())
            .with_paths(paths)
            .with_statuses(Some(previous.to_string()), Some(status.to_string()))
            .with_message(format!("layer {}", layer_id));
        self.record(entry, &mut change.warnings);
        Ok(self.finish(change))
    }

    // ---- history ----

    /// Turn every staged change into a history entry
    pub fn commit(&mut self, message: Option<&str>) -> WorkspaceResult<CommitOutcome> {
        let user = self.user()?;
        let mut outcome = CommitOutcome::default();

        for staged in self.staging.drain() {
            let payload = staged.payload;
            let mut entry = NewEntry::new(staged.kind, user.name.as_str())
                .with_paths(payload.paths)
                .with_statuses(payload.source_status, payload.target_status);
            if let Some(snapshot) = payload.snapshot {
                entry = entry.with_snapshot(snapshot);
            }
            let message = match (message, payload.overridden) {
                (Some(message), true) => Some(format!("{} (override)", message)),
                (Some(message), false) => Some(message.to_string()),
                (None, true) => Some("override".to_string()),
                (None, false) => None,
            };
            if let Some(message) = message {
                entry = entry.with_message(message);
            }
            let logged = self.record(entry, &mut outcome.warnings);
            outcome.entries.push(logged);
        }

        info!(user = %user.name, entries = outcome.entries.len(), "Changes committed");
        Ok(outcome)
    }

    /// Append to the graph and the change-log document
    ///
    /// A failed document append still keeps the in-memory entry.
    fn record(&mut self, entry: NewEntry, warnings: &mut Warnings) -> LogEntry {
        let logged = self.history.append_entry(entry);
        match append_to_log(self.change_log.source(), &logged) {
            Ok(text) => self.change_log.replace_source(text),
            Err(e) => {
                warn!(entry = logged.entry, error = %e, "Change log append failed");
                warnings.push(Warning::new(
                    e.kind(),
                    format!("log entry {} not written: {}", logged.entry, e),
                ));
            }
        }
        logged
    }

    pub fn checkout(&mut self, id: &str) -> WorkspaceResult<()> {
        self.history.checkout(id)?;
        Ok(())
    }

    /// Prim state as of history entry `id`
    pub fn reconstruct_at(&self, id: &str) -> WorkspaceResult<Reconstruction> {
        Ok(reconstruct_at(&self.history, id, &self.hierarchy.roots)?)
    }

    /// Write every changed document, the change log and changed layer
    /// descriptors back to the store
    pub fn save(&mut self) -> WorkspaceResult<Vec<String>> {
        let mut saved = Vec::new();
        for (name, doc) in self.documents.iter_mut().chain(self.referenced.iter_mut()) {
            if doc.is_dirty() {
                doc.save(self.store.as_mut())?;
                saved.push(name.clone());
            }
        }
        if self.change_log.is_dirty() {
            self.change_log.save(self.store.as_mut())?;
            saved.push(self.config.change_log_file.clone());
        }
        if self.config_dirty {
            self.store.write(DEFAULT_CONFIG_NAME, &self.config.to_json()?)?;
            self.config_dirty = false;
            saved.push(DEFAULT_CONFIG_NAME.to_string());
        }
        info!(documents = saved.len(), "Project saved");
        Ok(saved)
    }

    // ---- helpers ----

    fn user(&self) -> WorkspaceResult<User> {
        self.current_user.clone().ok_or(WorkspaceError::NoCurrentUser)
    }

    fn layer(&self, id: &str) -> WorkspaceResult<&Layer> {
        self.config
            .layers
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| WorkspaceError::LayerNotFound(id.to_string()))
    }

    fn ensure_layer_permission(&self, user: &User, document: &str) -> WorkspaceResult<()> {
        let layer = self
            .config
            .layers
            .iter()
            .find(|l| l.file_path == document)
            .ok_or_else(|| WorkspaceError::LayerNotFound(document.to_string()))?;
        let decision = check_layer_permission(user, layer);
        if decision.allowed {
            Ok(())
        } else {
            Err(WorkspaceError::PermissionDenied(decision.reason))
        }
    }

    /// Layer document and authored path behind a composed prim
    fn source_of(&self, path: &str) -> WorkspaceResult<(String, String)> {
        let prim = self
            .hierarchy
            .find(path)
            .ok_or_else(|| WorkspaceError::PrimNotFound(path.to_string()))?;
        match &prim.source {
            Some(source) if self.documents.contains_key(&source.document) => {
                Ok((source.document.clone(), source.path.clone()))
            }
            _ => Err(WorkspaceError::NoSourceLayer(path.to_string())),
        }
    }

    /// The prim at composed `path` as written in its source document
    fn authored_prim(&self, path: &str) -> Option<Prim> {
        let composed = self.hierarchy.find(path)?;
        let authored = composed.source.as_ref().and_then(|source| {
            let doc = self.documents.get(&source.document)?.parse().ok()?;
            doc.find_prim(&source.path).cloned()
        });
        Some(authored.unwrap_or_else(|| composed.clone()))
    }

    /// Copy of a layer document in `working`, taken on first use
    fn working_copy<'a>(
        &self,
        working: &'a mut BTreeMap<String, LayerDocument>,
        file_path: &str,
    ) -> WorkspaceResult<&'a mut LayerDocument> {
        if !working.contains_key(file_path) {
            let doc = self
                .documents
                .get(file_path)
                .cloned()
                .ok_or_else(|| WorkspaceError::NoSourceLayer(file_path.to_string()))?;
            working.insert(file_path.to_string(), doc);
        }
        working
            .get_mut(file_path)
            .ok_or_else(|| WorkspaceError::NoSourceLayer(file_path.to_string()))
    }

    fn document_mut(&mut self, file_path: &str) -> WorkspaceResult<&mut LayerDocument> {
        self.documents
            .get_mut(file_path)
            .ok_or_else(|| WorkspaceError::NoSourceLayer(file_path.to_string()))
    }

    fn finish(&mut self, change: ChangeSet) -> ChangeSet {
        for observer in &mut self.observers {
            observer.on_change(&change);
        }
        change
    }
}

fn status_kind(direction: Direction) -> ChangeKind {
    match direction {
        Direction::Promote => ChangeKind::Promote,
        Direction::Demote => ChangeKind::Demote,
    }
}

fn sibling_path(path: &str, name: &str) -> String {
    prim_path::join(prim_path::parent_of(path).unwrap_or("/"), name)
}

/// Retarget the arcs of `doc` that point into `target`; true when text changed
fn retarget_document(name: &str, doc: &mut LayerDocument, target: &str, old: &str, new: &str) -> bool {
    let parsed = match doc.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(document = %name, error = %e, "Skipping unparsable document during retarget");
            return false;
        }
    };

    let mut assets: Vec<String> = Vec::new();
    for prim in parsed.prims.iter().flat_map(|p| p.descendants()) {
        if let Some(arc) = &prim.arc {
            if resolve_asset_path(name, &arc.asset) == target && !assets.contains(&arc.asset) {
                assets.push(arc.asset.clone());
            }
        }
    }

    let mut text = doc.source().to_string();
    let mut total = 0;
    for asset in &assets {
        let (next, count) = retarget_references(&text, asset, old, new);
        text = next;
        total += count;
    }
    if total > 0 {
        debug!(document = %name, references = total, "References retargeted");
        doc.replace_source(text);
    }
    total > 0
}

/// Non-layer documents reachable from the layers through composition arcs
fn load_referenced(
    store: &dyn DocumentStore,
    layers: &BTreeMap<String, LayerDocument>,
) -> BTreeMap<String, LayerDocument> {
    let layer_paths: Vec<String> = layers.keys().map(|k| normalize(k)).collect();
    let mut queue: VecDeque<(String, SceneDocument)> = layers
        .iter()
        .filter_map(|(name, doc)| doc.parse().ok().map(|parsed| (name.clone(), parsed)))
        .collect();
    let mut loaded: BTreeMap<String, LayerDocument> = BTreeMap::new();

    while let Some((name, doc)) = queue.pop_front() {
        let arcs: Vec<String> = doc
            .prims
            .iter()
            .flat_map(|p| p.descendants())
            .filter_map(|p| p.arc.as_ref())
            .map(|arc| resolve_asset_path(&name, &arc.asset))
            .collect();

        for path in arcs {
            if layer_paths.contains(&path) || loaded.contains_key(&path) || !store.exists(&path) {
                continue;
            }
            let referenced = match LayerDocument::load(store, &path) {
                Ok(referenced) => referenced,
                Err(e) => {
                    warn!(document = %path, error = %e, "Referenced document not loaded");
                    continue;
                }
            };
            debug!(document = %path, referenced_by = %name, "Loaded referenced document");
            if let Ok(parsed) = referenced.parse() {
                queue.push_back((path.clone(), parsed));
            }
            loaded.insert(path, referenced);
        }
    }
    loaded
}
