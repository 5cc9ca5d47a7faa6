//! Messaging substrate between process slots.
//!
//! The engine talks to its temporal neighbours only through the
//! [`Communicator`] trait: buffered send, send with a completion handle,
//! receive by `(source, tag)` and broadcast from a root. [`ChannelWorld`]
//! is the in-process implementation: one unbounded crossbeam mailbox per
//! rank, with messages that arrive ahead of the one being waited for
//! stashed until asked for.
//!
//! # Failure propagation
//!
//! A rank that gives up calls [`Communicator::abort`] on its successor; a
//! rank whose [`Endpoint`] is dropped (normal exit or unwinding) tells
//! every other rank that it hung up. A receive that waits on an aborted or
//! hung-up source fails instead of blocking forever. Messages sent before
//! the abort are still delivered.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;

use crossbeam_channel::{Receiver, Sender};

// ── Tag ─────────────────────────────────────────────────────────────

/// Integer message tag.
///
/// Encodes the message kind, the iteration and the level so that values
/// from different phases of the protocol can never be confused, even
/// when they arrive out of order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u64);

const KIND_SHIFT: u32 = 48;
const ITER_SHIFT: u32 = 16;

impl Tag {
    /// Block-start broadcast of the initial value.
    pub const BCAST: Tag = Tag(0);

    fn encode(kind: u64, iteration: usize, level: usize) -> Self {
        let iteration = iteration as u64 & 0xffff_ffff;
        Tag((kind << KIND_SHIFT) | (iteration << ITER_SHIFT) | (level as u64 & 0xffff))
    }

    /// Coarse-level terminal value of iteration `iteration` on `level`.
    pub fn coarse(iteration: usize, level: usize) -> Self {
        Self::encode(1, iteration, level)
    }

    /// Fine terminal value and done flag published at the convergence
    /// check of `iteration`.
    pub fn check(iteration: usize) -> Self {
        Self::encode(2, iteration, 0)
    }

    /// Coarse value of predictor round `round`.
    pub fn predict(round: usize) -> Self {
        Self::encode(3, round, 0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.0 >> KIND_SHIFT;
        let iteration = (self.0 >> ITER_SHIFT) & 0xffff_ffff;
        let level = self.0 & 0xffff;
        match kind {
            0 => write!(f, "bcast"),
            1 => write!(f, "coarse(k={iteration}, l={level})"),
            2 => write!(f, "check(k={iteration})"),
            3 => write!(f, "predict(r={iteration})"),
            _ => write!(f, "tag({})", self.0),
        }
    }
}

// ── Packet ──────────────────────────────────────────────────────────

/// A value exchanged between steps, with the sender's done flag.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet<U> {
    /// The terminal (or initial) value.
    pub value: U,
    /// Whether the sender has finished iterating in this block.
    pub done: bool,
}

impl<U> Packet<U> {
    /// A value from a sender that is still iterating.
    pub fn pending(value: U) -> Self {
        Self { value, done: false }
    }
}

// ── CommError ───────────────────────────────────────────────────────

/// Errors from the messaging substrate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommError {
    /// The rank does not exist in this world.
    InvalidRank {
        /// The offending rank.
        rank: usize,
        /// World size.
        size: usize,
    },
    /// The source rank aborted its lineage before sending the message.
    PeerAborted {
        /// The rank that aborted.
        rank: usize,
    },
    /// The source rank exited without sending the message.
    Disconnected {
        /// The rank that hung up.
        rank: usize,
    },
    /// A broadcast root was given no value, or a non-root was given one.
    BroadcastMisuse {
        /// Rank of the caller.
        rank: usize,
        /// Root of the broadcast.
        root: usize,
    },
}

impl fmt::Display for CommError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRank { rank, size } => {
                write!(f, "rank {rank} out of range for world of size {size}")
            }
            Self::PeerAborted { rank } => write!(f, "rank {rank} aborted"),
            Self::Disconnected { rank } => write!(f, "rank {rank} disconnected"),
            Self::BroadcastMisuse { rank, root } => {
                write!(f, "broadcast from root {root}: only the root supplies a value (caller {rank})")
            }
        }
    }
}

impl Error for CommError {}

// ── SendHandle ──────────────────────────────────────────────────────

/// Completion handle of a non-blocking send.
///
/// Completes when the receiver has consumed the message.
#[derive(Debug)]
pub struct SendHandle {
    ack: Receiver<()>,
    dest: usize,
    complete: bool,
}

impl SendHandle {
    /// Poll for completion without blocking.
    pub fn test(&mut self) -> bool {
        if !self.complete {
            self.complete = matches!(self.ack.try_recv(), Ok(()));
        }
        self.complete
    }

    /// Block until the receiver consumed the message.
    ///
    /// # Errors
    ///
    /// [`CommError::Disconnected`] if the receiver exited without
    /// consuming it.
    pub fn wait(mut self) -> Result<(), CommError> {
        if self.test() {
            return Ok(());
        }
        self.ack
            .recv()
            .map_err(|_| CommError::Disconnected { rank: self.dest })
    }
}

// ── Communicator ────────────────────────────────────────────────────

/// Point-to-point and collective messaging among `size()` ranks.
pub trait Communicator<T: Send> {
    /// This rank's index.
    fn rank(&self) -> usize;

    /// Number of ranks.
    fn size(&self) -> usize;

    /// Buffered send; returns once the message is queued.
    fn send(&self, dest: usize, tag: Tag, msg: T) -> Result<(), CommError>;

    /// Non-blocking send returning a pollable completion handle.
    fn isend(&self, dest: usize, tag: Tag, msg: T) -> Result<SendHandle, CommError>;

    /// Block until the message `(source, tag)` arrives.
    fn recv(&mut self, source: usize, tag: Tag) -> Result<T, CommError>;

    /// Broadcast from `root`. The root passes `Some(value)`, everybody
    /// else `None`; every rank returns the root's value.
    fn bcast(&mut self, root: usize, value: Option<T>) -> Result<T, CommError>
    where
        T: Clone;

    /// Tell `dest` that this rank's lineage failed.
    fn abort(&self, dest: usize) -> Result<(), CommError>;
}

// ── ChannelWorld ────────────────────────────────────────────────────

enum Payload<T> {
    Data { tag: Tag, msg: T, ack: Option<Sender<()>> },
    Abort,
    Hangup,
}

struct Envelope<T> {
    source: usize,
    payload: Payload<T>,
}

/// Factory for a set of connected in-process [`Endpoint`]s.
pub struct ChannelWorld;

impl ChannelWorld {
    /// Create `size` connected endpoints; endpoint `i` has rank `i`.
    pub fn connect<T: Send>(size: usize) -> Vec<Endpoint<T>> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Endpoint {
                rank,
                senders: senders.clone(),
                inbox,
                stash: VecDeque::new(),
                closed: vec![None; size],
            })
            .collect()
    }
}

/// One rank of a [`ChannelWorld`].
pub struct Endpoint<T: Send> {
    rank: usize,
    senders: Vec<Sender<Envelope<T>>>,
    inbox: Receiver<Envelope<T>>,
    stash: VecDeque<(usize, Tag, T, Option<Sender<()>>)>,
    closed: Vec<Option<CommError>>,
}

impl<T: Send> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("rank", &self.rank)
            .field("size", &self.senders.len())
            .field("stashed", &self.stash.len())
            .finish()
    }
}

impl<T: Send> Endpoint<T> {
    fn check_rank(&self, rank: usize) -> Result<(), CommError> {
        if rank >= self.senders.len() {
            return Err(CommError::InvalidRank {
                rank,
                size: self.senders.len(),
            });
        }
        Ok(())
    }

    fn post(&self, dest: usize, payload: Payload<T>) -> Result<(), CommError> {
        self.check_rank(dest)?;
        self.senders[dest]
            .send(Envelope {
                source: self.rank,
                payload,
            })
            .map_err(|_| CommError::Disconnected { rank: dest })
    }

    fn take_stashed(&mut self, source: usize, tag: Tag) -> Option<T> {
        let pos = self
            .stash
            .iter()
            .position(|(s, t, _, _)| *s == source && *t == tag)?;
        let (_, _, msg, ack) = self.stash.remove(pos)?;
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        Some(msg)
    }

    /// Number of messages received ahead of being asked for.
    pub fn stashed(&self) -> usize {
        self.stash.len()
    }
}

impl<T: Send> Communicator<T> for Endpoint<T> {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, dest: usize, tag: Tag, msg: T) -> Result<(), CommError> {
        self.post(dest, Payload::Data { tag, msg, ack: None })
    }

    fn isend(&self, dest: usize, tag: Tag, msg: T) -> Result<SendHandle, CommError> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.post(
            dest,
            Payload::Data {
                tag,
                msg,
                ack: Some(ack_tx),
            },
        )?;
        Ok(SendHandle {
            ack: ack_rx,
            dest,
            complete: false,
        })
    }

    fn recv(&mut self, source: usize, tag: Tag) -> Result<T, CommError> {
        self.check_rank(source)?;
        if let Some(msg) = self.take_stashed(source, tag) {
            return Ok(msg);
        }
        loop {
            if let Some(err) = &self.closed[source] {
                return Err(err.clone());
            }
            // Our own sender keeps the inbox connected; recv cannot fail.
            let envelope = self
                .inbox
                .recv()
                .map_err(|_| CommError::Disconnected { rank: source })?;
            match envelope.payload {
                Payload::Data { tag: t, msg, ack } => {
                    if envelope.source == source && t == tag {
                        if let Some(ack) = ack {
                            let _ = ack.send(());
                        }
                        return Ok(msg);
                    }
                    self.stash.push_back((envelope.source, t, msg, ack));
                }
                Payload::Abort => {
                    self.closed[envelope.source] =
                        Some(CommError::PeerAborted { rank: envelope.source });
                }
                Payload::Hangup => {
                    self.closed[envelope.source]
                        .get_or_insert(CommError::Disconnected { rank: envelope.source });
                }
            }
        }
    }

    fn bcast(&mut self, root: usize, value: Option<T>) -> Result<T, CommError>
    where
        T: Clone,
    {
        self.check_rank(root)?;
        match (self.rank == root, value) {
            (true, Some(v)) => {
                for dest in (0..self.senders.len()).filter(|d| *d != root) {
                    self.send(dest, Tag::BCAST, v.clone())?;
                }
                Ok(v)
            }
            (false, None) => self.recv(root, Tag::BCAST),
            _ => Err(CommError::BroadcastMisuse {
                rank: self.rank,
                root,
            }),
        }
    }

    fn abort(&self, dest: usize) -> Result<(), CommError> {
        self.post(dest, Payload::Abort)
    }
}

impl<T: Send> Drop for Endpoint<T> {
    fn drop(&mut self) {
        for (dest, tx) in self.senders.iter().enumerate() {
            if dest != self.rank {
                let _ = tx.send(Envelope {
                    source: self.rank,
                    payload: Payload::Hangup,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn tags_are_distinct_per_phase() {
        assert_ne!(Tag::coarse(1, 0), Tag::check(1));
        assert_ne!(Tag::coarse(1, 1), Tag::coarse(1, 0));
        assert_ne!(Tag::coarse(2, 0), Tag::coarse(1, 0));
        assert_ne!(Tag::predict(0), Tag::BCAST);
        assert_eq!(Tag::coarse(3, 1).to_string(), "coarse(k=3, l=1)");
    }

    #[test]
    fn out_of_order_messages_are_stashed() {
        let mut eps = ChannelWorld::connect::<i32>(2);
        let b = eps.pop().unwrap();
        let mut a = eps.pop().unwrap();
        b.send(0, Tag::check(2), 22).unwrap();
        b.send(0, Tag::check(1), 11).unwrap();
        assert_eq!(a.recv(1, Tag::check(1)).unwrap(), 11);
        assert_eq!(a.stashed(), 1);
        assert_eq!(a.recv(1, Tag::check(2)).unwrap(), 22);
        assert_eq!(a.stashed(), 0);
    }

    #[test]
    fn isend_completes_on_consumption() {
        let mut eps = ChannelWorld::connect::<i32>(2);
        let mut b = eps.pop().unwrap();
        let a = eps.pop().unwrap();
        let mut handle = a.isend(1, Tag::check(1), 5).unwrap();
        assert!(!handle.test());
        assert_eq!(b.recv(0, Tag::check(1)).unwrap(), 5);
        assert!(handle.test());
        handle.wait().unwrap();
    }

    #[test]
    fn wait_reports_receiver_exit() {
        let mut eps = ChannelWorld::connect::<i32>(2);
        let b = eps.pop().unwrap();
        let a = eps.pop().unwrap();
        let handle = a.isend(1, Tag::check(1), 5).unwrap();
        drop(b);
        assert_eq!(handle.wait(), Err(CommError::Disconnected { rank: 1 }));
    }

    #[test]
    fn abort_fails_pending_receive() {
        let mut eps = ChannelWorld::connect::<i32>(2);
        let mut b = eps.pop().unwrap();
        let a = eps.pop().unwrap();
        a.send(1, Tag::check(1), 1).unwrap();
        a.abort(1).unwrap();
        assert_eq!(b.recv(0, Tag::check(1)).unwrap(), 1);
        assert_eq!(
            b.recv(0, Tag::check(2)),
            Err(CommError::PeerAborted { rank: 0 })
        );
    }

    #[test]
    fn dropped_endpoint_unblocks_receiver() {
        let mut eps = ChannelWorld::connect::<i32>(2);
        let mut b = eps.pop().unwrap();
        let a = eps.pop().unwrap();
        let waiter = thread::spawn(move || b.recv(0, Tag::check(1)));
        drop(a);
        assert_eq!(
            waiter.join().unwrap(),
            Err(CommError::Disconnected { rank: 0 })
        );
    }

    #[test]
    fn bcast_reaches_every_rank() {
        let eps = ChannelWorld::connect::<f64>(4);
        let results: Vec<f64> = thread::scope(|s| {
            let handles: Vec<_> = eps
                .into_iter()
                .map(|mut ep| {
                    s.spawn(move || {
                        let value = (ep.rank() == 0).then_some(2.5);
                        ep.bcast(0, value).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results, vec![2.5; 4]);
    }

    #[test]
    fn bcast_misuse_is_rejected() {
        let mut eps = ChannelWorld::connect::<f64>(2);
        let mut root = eps.remove(0);
        assert!(matches!(
            root.bcast(0, None),
            Err(CommError::BroadcastMisuse { .. })
        ));
    }

    #[test]
    fn invalid_rank_rejected() {
        let eps = ChannelWorld::connect::<f64>(1);
        assert_eq!(
            eps[0].send(3, Tag::BCAST, 1.0),
            Err(CommError::InvalidRank { rank: 3, size: 1 })
        );
    }
}
