//! Per-user cache/log engine and the per-tick package compiler.
//!
//! A playground keeps three structures per known user: the live-ball cache,
//! the pending collision log, and the compiled scratch buffers filled once
//! per broadcast tick. All three sit behind one lock and always hold the
//! same key set.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bytes::{BufMut, BytesMut};
use thiserror::Error;

use barrage_shared::ball::{Ball, BallState};
use barrage_shared::ids::{BallID, FullBallID, UserID, SYS_ID};
use barrage_shared::message::{CollisionInfo, PlaygroundInfo};
use barrage_shared::wire::encode_list;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaygroundError {
    #[error("not found user {0}")]
    NotFoundUser(UserID),
}

/// One pre-serialized list fragment: item count plus body bytes with the
/// 4-byte count header stripped.
#[derive(Default)]
struct BytesCache {
    num: u32,
    buf: BytesMut,
}

impl BytesCache {
    fn clear(&mut self) {
        self.num = 0;
        self.buf.clear();
    }
}

/// Per-user scratch buffers, valid only within the tick that filled them.
#[derive(Default)]
struct CompiledCache {
    collisions: BytesCache,
    balls: BytesCache,
    /// Assembled outbound body for this user as a receiver.
    buffer: BytesMut,
}

/// Which fragment of a [`CompiledCache`] a fan-out section aggregates.
#[derive(Clone, Copy)]
enum Fragment {
    Balls,
    Collisions,
}

#[derive(Default)]
struct PlaygroundState {
    ball_caches: HashMap<UserID, HashMap<BallID, Ball>>,
    collision_logs: HashMap<UserID, Vec<CollisionInfo>>,
    compiled: HashMap<UserID, CompiledCache>,
}

/// Aggregates every user's live balls and pending collisions, and compiles
/// one personalized package per user each broadcast tick.
///
/// Each user's contribution is serialized exactly once per tick and its bytes
/// reused for every other receiver, so a tick costs O(n) encoding plus the
/// unavoidable O(n^2) byte copies.
pub struct Playground {
    state: Mutex<PlaygroundState>,
}

impl Playground {
    pub fn new() -> Self {
        let pg = Playground {
            state: Mutex::new(PlaygroundState::default()),
        };
        pg.lock().add_user(SYS_ID);
        pg
    }

    fn lock(&self) -> MutexGuard<'_, PlaygroundState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `uid`, allocating its three empty structures. No-op when the
    /// user is already present.
    pub fn add_user(&self, uid: UserID) {
        self.lock().add_user(uid);
    }

    /// Remove `uid` and everything they own. Pending collisions move to the
    /// system log, and each surviving ball becomes one synthesized collision
    /// against the system, so remaining users still learn of the vanishing.
    /// No-op when absent; the system user is never deleted.
    pub fn delete_user(&self, uid: UserID) {
        self.lock().delete_user(uid);
    }

    /// Ingest one sender-submitted update package.
    pub fn put_pkg(&self, pi: &PlaygroundInfo) -> Result<(), PlaygroundError> {
        self.lock().put_pkg(pi)
    }

    /// Compile one outbound package per non-system user, then clear every
    /// collision log and scratch buffer for the next tick. Mutates state
    /// despite being the read side of the cycle, hence the exclusive lock.
    pub fn pkgs_for_each_user(&self) -> Vec<PlaygroundInfo> {
        self.lock().compile()
    }

    #[cfg(test)]
    fn key_sets(
        &self,
    ) -> (
        std::collections::BTreeSet<UserID>,
        std::collections::BTreeSet<UserID>,
        std::collections::BTreeSet<UserID>,
    ) {
        let st = self.lock();
        (
            st.ball_caches.keys().copied().collect(),
            st.collision_logs.keys().copied().collect(),
            st.compiled.keys().copied().collect(),
        )
    }
}

impl Default for Playground {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaygroundState {
    fn add_user(&mut self, uid: UserID) {
        if self.ball_caches.contains_key(&uid) {
            return;
        }
        self.ball_caches.insert(uid, HashMap::new());
        self.collision_logs.insert(uid, Vec::new());
        self.compiled.insert(uid, CompiledCache::default());
    }

    fn delete_user(&mut self, uid: UserID) {
        if uid == SYS_ID {
            return;
        }
        let Some(balls) = self.ball_caches.remove(&uid) else {
            return;
        };
        let mut pending = self.collision_logs.remove(&uid).unwrap_or_default();
        self.compiled.remove(&uid);

        let Some(sys_log) = self.collision_logs.get_mut(&SYS_ID) else {
            return;
        };
        sys_log.append(&mut pending);
        for ball in balls.values() {
            sys_log.push(CollisionInfo {
                ids: [FullBallID::SYS, FullBallID { uid, id: ball.id }],
                damages: [0, 0],
                states: [BallState::Alive, BallState::Disappear],
            });
        }
    }

    fn put_pkg(&mut self, pi: &PlaygroundInfo) -> Result<(), PlaygroundError> {
        let uid = pi.sender;
        match self.ball_caches.get_mut(&uid) {
            Some(cache) => {
                // new and displaced balls are both plain upserts by ball id
                for ball in pi.new_balls.iter().chain(&pi.displacements) {
                    cache.insert(ball.id, ball.clone());
                }
            }
            None => return Err(PlaygroundError::NotFoundUser(uid)),
        }

        // A non-alive participant must still exist in its owner's cache,
        // otherwise the whole entry is a stale duplicate and is dropped.
        // Index 1 is checked before index 0.
        let mut valid = Vec::with_capacity(pi.collisions.len());
        'entries: for ci in &pi.collisions {
            for idx in [1, 0] {
                if ci.states[idx] != BallState::Alive
                    && !self.take_ball(ci.ids[idx].uid, ci.ids[idx].id)
                {
                    continue 'entries;
                }
            }
            valid.push(ci.clone());
        }
        if let Some(log) = self.collision_logs.get_mut(&uid) {
            log.extend(valid);
        }

        // disappearances delete directly, no collision is synthesized
        if let Some(cache) = self.ball_caches.get_mut(&uid) {
            for id in &pi.disappears {
                cache.remove(id);
            }
        }

        Ok(())
    }

    /// Remove ball `id` from `owner`'s cache. False when owner or ball is
    /// absent.
    fn take_ball(&mut self, owner: UserID, id: BallID) -> bool {
        self.ball_caches
            .get_mut(&owner)
            .is_some_and(|cache| cache.remove(&id).is_some())
    }

    fn compile(&mut self) -> Vec<PlaygroundInfo> {
        self.precompile();

        let receivers: Vec<UserID> = self
            .ball_caches
            .keys()
            .copied()
            .filter(|&uid| uid != SYS_ID)
            .collect();
        let mut pkgs = Vec::with_capacity(receivers.len());
        for uid in receivers {
            pkgs.push(PlaygroundInfo {
                sender: SYS_ID,
                receiver: uid,
                payload: self.fill_body(uid),
                ..Default::default()
            });
        }

        self.reset();
        pkgs
    }

    /// Serialize every user's collision log and ball cache once, caching the
    /// item count and the header-stripped bytes for reuse across receivers.
    fn precompile(&mut self) {
        let mut scratch = BytesMut::new();
        for (uid, cache) in &self.ball_caches {
            let Some(compiled) = self.compiled.get_mut(uid) else {
                continue;
            };
            let log = self
                .collision_logs
                .get(uid)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            scratch.clear();
            match encode_list(log, &mut scratch) {
                Ok(()) => {
                    compiled.collisions.num = log.len() as u32;
                    compiled.collisions.buf.extend_from_slice(&scratch[4..]);
                }
                Err(err) => {
                    tracing::error!(uid = *uid, error = %err, "collision precompile failed");
                }
            }

            let balls: Vec<Ball> = cache.values().cloned().collect();
            scratch.clear();
            match encode_list(&balls, &mut scratch) {
                Ok(()) => {
                    compiled.balls.num = balls.len() as u32;
                    compiled.balls.buf.extend_from_slice(&scratch[4..]);
                }
                Err(err) => {
                    tracing::error!(uid = *uid, error = %err, "ball precompile failed");
                }
            }
        }
    }

    /// Assemble `receiver`'s outbound body from the cached fragments of every
    /// other user. Section order: new balls, displacements, collisions,
    /// disappearances; the first and last stay zero-count.
    fn fill_body(&mut self, receiver: UserID) -> Vec<u8> {
        let mut body = match self.compiled.get_mut(&receiver) {
            Some(compiled) => std::mem::take(&mut compiled.buffer),
            None => return Vec::new(),
        };

        body.put_u32(0);
        self.append_section(receiver, &mut body, Fragment::Balls);
        self.append_section(receiver, &mut body, Fragment::Collisions);
        body.put_u32(0);

        let bytes = body.to_vec();
        if let Some(compiled) = self.compiled.get_mut(&receiver) {
            compiled.buffer = body;
        }
        bytes
    }

    /// Append one aggregated section: a count header followed by the cached
    /// fragment bytes of every user except `receiver`. The header layout must
    /// match [`encode_list`] so receivers decode with the generic decoder.
    fn append_section(&self, receiver: UserID, body: &mut BytesMut, fragment: Fragment) {
        let header_offset = body.len();
        let mut count: u32 = 0;
        body.put_u32(0);

        for (uid, compiled) in &self.compiled {
            if *uid == receiver {
                continue;
            }
            let frag = match fragment {
                Fragment::Balls => &compiled.balls,
                Fragment::Collisions => &compiled.collisions,
            };
            if frag.num != 0 {
                count += frag.num;
                body.extend_from_slice(&frag.buf);
            }
        }

        body[header_offset..header_offset + 4].copy_from_slice(&count.to_be_bytes());
    }

    fn reset(&mut self) {
        for log in self.collision_logs.values_mut() {
            log.clear();
        }
        for compiled in self.compiled.values_mut() {
            compiled.collisions.clear();
            compiled.balls.clear();
            compiled.buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(id: BallID) -> Ball {
        Ball {
            id,
            state: BallState::Alive,
            x: 10.0,
            y: 20.0,
            radius: 8.0,
            hp: 100,
        }
    }

    fn pkg(sender: UserID) -> PlaygroundInfo {
        PlaygroundInfo {
            sender,
            ..Default::default()
        }
    }

    fn collision(a: FullBallID, b: FullBallID, states: [BallState; 2]) -> CollisionInfo {
        CollisionInfo {
            ids: [a, b],
            damages: [10, 10],
            states,
        }
    }

    /// Decode one compiled payload back into typed lists.
    fn decode(pi: &PlaygroundInfo) -> PlaygroundInfo {
        PlaygroundInfo::decode_body(pi.sender, pi.receiver, &mut &pi.payload[..]).unwrap()
    }

    fn find(pkgs: &[PlaygroundInfo], receiver: UserID) -> &PlaygroundInfo {
        pkgs.iter().find(|p| p.receiver == receiver).unwrap()
    }

    #[test]
    fn key_sets_stay_identical() {
        let pg = Playground::new();
        let (a, b, c) = pg.key_sets();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(a.contains(&SYS_ID));

        pg.add_user(1);
        pg.add_user(2);
        pg.add_user(1);
        pg.delete_user(2);
        pg.delete_user(7);

        let (a, b, c) = pg.key_sets();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn add_user_is_idempotent() {
        let pg = Playground::new();
        pg.add_user(1);
        let mut update = pkg(1);
        update.new_balls.push(ball(1));
        pg.put_pkg(&update).unwrap();

        // a second add must not wipe the existing cache
        pg.add_user(1);
        pg.add_user(2);
        let pkgs = pg.pkgs_for_each_user();
        let for_two = decode(find(&pkgs, 2));
        assert_eq!(for_two.displacements.len(), 1);
    }

    #[test]
    fn sys_user_is_never_deleted() {
        let pg = Playground::new();
        pg.delete_user(SYS_ID);
        let (a, _, _) = pg.key_sets();
        assert!(a.contains(&SYS_ID));
    }

    #[test]
    fn put_pkg_from_unknown_sender_fails_without_side_effects() {
        let pg = Playground::new();
        pg.add_user(1);

        let mut update = pkg(99);
        update.new_balls.push(ball(1));
        assert_eq!(
            pg.put_pkg(&update).unwrap_err(),
            PlaygroundError::NotFoundUser(99)
        );

        let before = pg.key_sets();
        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(decode(find(&pkgs, 1)).displacements.len(), 0);
        assert_eq!(pg.key_sets(), before);
    }

    #[test]
    fn two_users_see_each_others_balls() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut from_a = pkg(1);
        from_a.new_balls.push(ball(11));
        pg.put_pkg(&from_a).unwrap();

        let mut from_b = pkg(2);
        from_b.new_balls.push(ball(22));
        pg.put_pkg(&from_b).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(pkgs.len(), 2);

        let for_a = decode(find(&pkgs, 1));
        assert_eq!(for_a.new_balls.len(), 0);
        assert_eq!(for_a.displacements.len(), 1);
        assert_eq!(for_a.displacements[0].id, 22);
        assert_eq!(for_a.disappears.len(), 0);

        let for_b = decode(find(&pkgs, 2));
        assert_eq!(for_b.new_balls.len(), 0);
        assert_eq!(for_b.displacements.len(), 1);
        assert_eq!(for_b.displacements[0].id, 11);
    }

    #[test]
    fn displacement_count_sums_all_other_users() {
        let pg = Playground::new();
        for uid in 1..=3 {
            pg.add_user(uid);
        }
        // user 1 owns two balls, user 2 one, user 3 none
        let mut from_one = pkg(1);
        from_one.new_balls.push(ball(1));
        from_one.new_balls.push(ball(2));
        pg.put_pkg(&from_one).unwrap();
        let mut from_two = pkg(2);
        from_two.new_balls.push(ball(1));
        pg.put_pkg(&from_two).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(decode(find(&pkgs, 1)).displacements.len(), 1);
        assert_eq!(decode(find(&pkgs, 2)).displacements.len(), 2);
        assert_eq!(decode(find(&pkgs, 3)).displacements.len(), 3);
    }

    #[test]
    fn displacement_overwrites_cached_ball() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut first = pkg(1);
        first.new_balls.push(ball(5));
        pg.put_pkg(&first).unwrap();
        pg.pkgs_for_each_user();

        let mut moved = ball(5);
        moved.x = 99.0;
        let mut second = pkg(1);
        second.displacements.push(moved);
        pg.put_pkg(&second).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        let for_two = decode(find(&pkgs, 2));
        assert_eq!(for_two.displacements.len(), 1);
        assert_eq!(for_two.displacements[0].x, 99.0);
    }

    #[test]
    fn stale_collision_is_discarded() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        // names a dead ball that exists nowhere
        let mut update = pkg(1);
        update.collisions.push(collision(
            FullBallID { uid: 1, id: 1 },
            FullBallID { uid: 2, id: 77 },
            [BallState::Alive, BallState::Dead],
        ));
        pg.put_pkg(&update).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(decode(find(&pkgs, 2)).collisions.len(), 0);
    }

    #[test]
    fn valid_collision_deletes_dead_ball_and_broadcasts() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut seed = pkg(2);
        seed.new_balls.push(ball(77));
        pg.put_pkg(&seed).unwrap();

        let mut update = pkg(1);
        update.collisions.push(collision(
            FullBallID { uid: 1, id: 1 },
            FullBallID { uid: 2, id: 77 },
            [BallState::Alive, BallState::Dead],
        ));
        pg.put_pkg(&update).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        let for_two = decode(find(&pkgs, 2));
        assert_eq!(for_two.collisions.len(), 1);
        assert_eq!(for_two.collisions[0].ids[1], FullBallID { uid: 2, id: 77 });
        // the dead ball is gone from user 2's cache
        assert_eq!(decode(find(&pkgs, 1)).displacements.len(), 0);
    }

    #[test]
    fn collision_logs_clear_after_each_tick() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut seed = pkg(2);
        seed.new_balls.push(ball(77));
        pg.put_pkg(&seed).unwrap();
        let mut update = pkg(1);
        update.collisions.push(collision(
            FullBallID { uid: 1, id: 1 },
            FullBallID { uid: 2, id: 77 },
            [BallState::Alive, BallState::Dead],
        ));
        pg.put_pkg(&update).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(decode(find(&pkgs, 2)).collisions.len(), 1);

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(decode(find(&pkgs, 2)).collisions.len(), 0);
    }

    #[test]
    fn disappears_delete_without_synthesized_collision() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut seed = pkg(1);
        seed.new_balls.push(ball(3));
        pg.put_pkg(&seed).unwrap();
        pg.pkgs_for_each_user();

        let mut update = pkg(1);
        update.disappears.push(3);
        pg.put_pkg(&update).unwrap();

        let pkgs = pg.pkgs_for_each_user();
        let for_two = decode(find(&pkgs, 2));
        assert_eq!(for_two.displacements.len(), 0);
        assert_eq!(for_two.collisions.len(), 0);
    }

    #[test]
    fn delete_user_turns_balls_into_system_collisions() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);
        pg.add_user(3);

        let mut seed = pkg(1);
        seed.new_balls.push(ball(4));
        seed.new_balls.push(ball(5));
        pg.put_pkg(&seed).unwrap();

        pg.delete_user(1);

        let pkgs = pg.pkgs_for_each_user();
        assert_eq!(pkgs.len(), 2);
        for receiver in [2, 3] {
            let decoded = decode(find(&pkgs, receiver));
            assert_eq!(decoded.collisions.len(), 2);
            let mut vanished: Vec<BallID> = decoded
                .collisions
                .iter()
                .map(|ci| {
                    assert_eq!(ci.ids[0], FullBallID::SYS);
                    assert_eq!(ci.ids[1].uid, 1);
                    assert_eq!(ci.states, [BallState::Alive, BallState::Disappear]);
                    ci.ids[1].id
                })
                .collect();
            vanished.sort_unstable();
            assert_eq!(vanished, vec![4, 5]);
            // the deleted user's balls are out of the displacement feed
            assert_eq!(decoded.displacements.len(), 0);
        }
    }

    #[test]
    fn delete_user_moves_pending_collisions_to_system_log() {
        let pg = Playground::new();
        pg.add_user(1);
        pg.add_user(2);

        let mut seed = pkg(2);
        seed.new_balls.push(ball(8));
        pg.put_pkg(&seed).unwrap();

        let mut update = pkg(1);
        update.collisions.push(collision(
            FullBallID { uid: 1, id: 1 },
            FullBallID { uid: 2, id: 8 },
            [BallState::Alive, BallState::Dead],
        ));
        pg.put_pkg(&update).unwrap();

        pg.delete_user(1);

        // user 1's logged collision survives via the system log
        let pkgs = pg.pkgs_for_each_user();
        let for_two = decode(find(&pkgs, 2));
        assert_eq!(for_two.collisions.len(), 1);
        assert_eq!(for_two.collisions[0].ids[1], FullBallID { uid: 2, id: 8 });
    }
}
