// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;
use tracing::{debug, warn};

use crate::stats::{DerivedView, Summarize, derive_view};
use crate::view::{PartyFilter, Record, SortKey, StatusFilter, ViewParams};

/// Sequence number handed out per fetch. Only the newest one may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub const fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCommand<S> {
    SetQuery(String),
    SetStatus(StatusFilter<S>),
    SetMeasureRange { min: Option<i64>, max: Option<i64> },
    SetParty(PartyFilter),
    SetDateRange { from: Option<Date>, to: Option<Date> },
    SetSort(SortKey),
    ToggleDeleted,
    ResetFilters,
    ClearNotice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ParamsChanged,
    DeletedFilterChanged(bool),
    RefetchRequested,
    CollectionReplaced {
        ticket: FetchTicket,
        count: usize,
    },
    StaleResponseIgnored {
        ticket: FetchTicket,
        latest: FetchTicket,
    },
    FetchFailed(String),
    ValidationFailed(String),
    MutationRejected(String),
    MutationSucceeded(String),
    MutationFailed(String),
    NoticeUpdated(String),
    NoticeCleared,
}

/// One page's raw collection plus the parameters the user has set on it.
///
/// The collection is replaced wholesale by [`ViewSession::complete_fetch`] and
/// never patched in place; everything shown is recomputed from it through
/// [`ViewSession::derived`].
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSession<R: Record> {
    records: Vec<R>,
    params: ViewParams<R::Status>,
    include_deleted: bool,
    notice: Option<String>,
    issued: u64,
    applied: Option<FetchTicket>,
    mutation_in_flight: bool,
}

impl<R: Record> Default for ViewSession<R> {
    fn default() -> Self {
        Self::new(ViewParams::default())
    }
}

impl<R: Record> ViewSession<R> {
    pub fn new(params: ViewParams<R::Status>) -> Self {
        Self {
            records: Vec::new(),
            params,
            include_deleted: false,
            notice: None,
            issued: 0,
            applied: None,
            mutation_in_flight: false,
        }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn params(&self) -> &ViewParams<R::Status> {
        &self.params
    }

    pub fn include_deleted(&self) -> bool {
        self.include_deleted
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.applied.is_some()
    }

    pub fn mutation_in_flight(&self) -> bool {
        self.mutation_in_flight
    }

    pub fn dispatch(&mut self, command: ViewCommand<R::Status>) -> Vec<ViewEvent> {
        match command {
            ViewCommand::SetQuery(query) => {
                self.params.query = query;
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::SetStatus(status) => {
                self.params.status = status;
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::SetMeasureRange { min, max } => {
                self.params.min_measure = min;
                self.params.max_measure = max;
                let mut events = vec![ViewEvent::ParamsChanged];
                if let (Some(min), Some(max)) = (min, max)
                    && min > max
                {
                    events.push(self.set_notice(format!(
                        "minimum {min} is above maximum {max}; nothing can match"
                    )));
                }
                events
            }
            ViewCommand::SetParty(party) => {
                self.params.party = party;
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::SetDateRange { from, to } => {
                self.params.date_from = from;
                self.params.date_to = to;
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::SetSort(sort) => {
                self.params.sort = sort;
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::ToggleDeleted => {
                self.include_deleted = !self.include_deleted;
                let label = if self.include_deleted {
                    "deleted shown"
                } else {
                    "deleted hidden"
                };
                vec![
                    ViewEvent::DeletedFilterChanged(self.include_deleted),
                    self.set_notice(label.to_owned()),
                    ViewEvent::RefetchRequested,
                ]
            }
            ViewCommand::ResetFilters => {
                let sort = self.params.sort;
                self.params = ViewParams {
                    sort,
                    ..ViewParams::default()
                };
                vec![ViewEvent::ParamsChanged]
            }
            ViewCommand::ClearNotice => {
                self.notice = None;
                vec![ViewEvent::NoticeCleared]
            }
        }
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.issued += 1;
        FetchTicket(self.issued)
    }

    /// Apply a fetch result if it answers the newest request. A failure keeps
    /// the previous collection.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<R>>,
    ) -> Vec<ViewEvent> {
        let latest = FetchTicket(self.issued);
        if ticket != latest {
            warn!(
                ticket = ticket.get(),
                latest = latest.get(),
                "dropping stale fetch response"
            );
            return vec![ViewEvent::StaleResponseIgnored { ticket, latest }];
        }

        match result {
            Ok(records) => {
                let count = records.len();
                debug!(ticket = ticket.get(), count, "collection replaced");
                self.records = records;
                self.applied = Some(ticket);
                vec![ViewEvent::CollectionReplaced { ticket, count }]
            }
            Err(error) => {
                let message = format!("refresh failed: {error:#}");
                warn!(ticket = ticket.get(), %message, "fetch failed; keeping previous rows");
                vec![
                    ViewEvent::FetchFailed(message.clone()),
                    self.set_notice(message),
                ]
            }
        }
    }

    pub fn begin_mutation(&mut self) -> Result<()> {
        if self.mutation_in_flight {
            bail!("another change is still saving -- wait for it to finish and retry");
        }
        self.mutation_in_flight = true;
        Ok(())
    }

    /// Close the in-flight mutation. Success asks for a refetch; failure
    /// leaves the collection as it was.
    pub fn finish_mutation(&mut self, outcome: Result<String>) -> Vec<ViewEvent> {
        self.mutation_in_flight = false;
        match outcome {
            Ok(message) => vec![
                ViewEvent::MutationSucceeded(message.clone()),
                self.set_notice(message),
                ViewEvent::RefetchRequested,
            ],
            Err(error) => {
                let message = format!("{error:#}");
                warn!(%message, "mutation failed");
                vec![
                    ViewEvent::MutationFailed(message.clone()),
                    self.set_notice(message),
                ]
            }
        }
    }

    /// Input rejected before anything reached the store.
    pub fn reject_input(&mut self, error: &anyhow::Error) -> Vec<ViewEvent> {
        let message = error.to_string();
        vec![
            ViewEvent::ValidationFailed(message.clone()),
            self.set_notice(message),
        ]
    }

    pub fn derived(&self) -> DerivedView<'_, R>
    where
        R: Summarize,
    {
        derive_view(&self.records, &self.params)
    }

    fn set_notice(&mut self, message: String) -> ViewEvent {
        self.notice = Some(message.clone());
        ViewEvent::NoticeUpdated(message)
    }
}
