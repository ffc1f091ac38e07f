//! Shared round state and settlement.
//!
//! One mutex guards the whole game ledger: the phase machine, the live
//! multiplier, the frozen aggregates, every seat's per-round fields and
//! lifetime profit, and the house accumulator. Phase changes are published
//! on a watch channel for anyone who wants to observe transitions without
//! polling the lock.
//!
//! The round manager is the only caller of the phase-advancing operations
//! (`begin_betting`, `close_betting`, `tick`, `settle`); connection handlers
//! call `record_bet` and `record_cashout` concurrently against it.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::protocol::PlayerId;

/// Where the round is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Betting,
    Flight,
    Exploding,
    Settling,
}

/// Why a protocol-valid request was refused. Rejections are silent on the
/// wire; the kind exists for callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    WrongPhase,
    BadAmount,
    DuplicateBet,
    NoBet,
    AlreadyCashedOut,
    TooLate,
}

/// Receipt for an accepted cash-out, settled inline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cashout {
    pub multiplier: f32,
    pub payout: f32,
    pub player_profit: f32,
    pub house_profit: f32,
}

/// End-of-round report entry for one seat that had a bet.
#[derive(Debug, Clone, Copy)]
pub struct Settlement {
    pub id: PlayerId,
    pub cashed_out: bool,
    pub payout: f32,
    pub player_profit: f32,
}

/// Aggregate view for logging and tests.
#[derive(Debug, Clone, Copy)]
pub struct RoundSnapshot {
    pub phase: Phase,
    pub multiplier: f32,
    pub explosion_point: f32,
    pub bet_count: u32,
    pub bet_sum: f32,
    pub house_profit: f32,
}

/// Per-seat ledger. `profit` is the lifetime accumulator and survives
/// rounds; the rest resets when a betting window opens.
#[derive(Debug, Clone, Copy, Default)]
struct Ledger {
    bet: f32,
    cashout: Option<f32>,
    settled: bool,
    profit: f32,
}

struct RoundInner {
    phase: Phase,
    multiplier: f32,
    explosion_point: f32,
    bet_count: u32,
    bet_sum: f32,
    house_profit: f32,
    players: Vec<Ledger>,
    /// Bets of players that disconnected this round. They stay in the
    /// aggregates and settle as losses: an accepted bet is the house's
    /// liability, so it is also the house's win.
    forfeited: Vec<f32>,
}

impl RoundInner {
    fn ledger(&self, id: PlayerId) -> Option<&Ledger> {
        if id < 1 {
            return None;
        }
        self.players.get(id as usize - 1)
    }
}

pub struct RoundState {
    inner: Mutex<RoundInner>,
    phase_tx: watch::Sender<Phase>,
}

impl RoundState {
    pub fn new(capacity: usize) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            inner: Mutex::new(RoundInner {
                phase: Phase::Idle,
                multiplier: 0.0,
                explosion_point: 0.0,
                bet_count: 0,
                bet_sum: 0.0,
                house_profit: 0.0,
                players: vec![Ledger::default(); capacity],
                forfeited: Vec::new(),
            }),
            phase_tx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Observe phase transitions without holding the state lock.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_tx.subscribe()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let g = self.inner.lock();
        RoundSnapshot {
            phase: g.phase,
            multiplier: g.multiplier,
            explosion_point: g.explosion_point,
            bet_count: g.bet_count,
            bet_sum: g.bet_sum,
            house_profit: g.house_profit,
        }
    }

    pub fn house_profit(&self) -> f32 {
        self.inner.lock().house_profit
    }

    fn publish(&self, phase: Phase) {
        self.phase_tx.send_replace(phase);
    }

    /// Open a betting window: reset every seat's per-round fields and the
    /// aggregates. Lifetime profits and the house accumulator persist.
    pub fn begin_betting(&self) {
        {
            let mut g = self.inner.lock();
            g.phase = Phase::Betting;
            g.multiplier = 0.0;
            g.explosion_point = 0.0;
            g.bet_count = 0;
            g.bet_sum = 0.0;
            for p in &mut g.players {
                p.bet = 0.0;
                p.cashout = None;
                p.settled = false;
            }
            g.forfeited.clear();
        }
        self.publish(Phase::Betting);
    }

    /// Accept one bet per seat per round, only while Betting.
    pub fn record_bet(&self, id: PlayerId, amount: f32) -> Result<(), Reject> {
        let mut g = self.inner.lock();
        if g.phase != Phase::Betting {
            return Err(Reject::WrongPhase);
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Reject::BadAmount);
        }
        let idx = match g.ledger(id) {
            Some(p) if p.bet > 0.0 => return Err(Reject::DuplicateBet),
            Some(_) => id as usize - 1,
            None => return Err(Reject::WrongPhase),
        };
        g.players[idx].bet = amount;
        Ok(())
    }

    /// Freeze the aggregates, fix the explosion point and lift off.
    ///
    /// The explosion point is deterministic from the bets:
    /// `me = sqrt(1 + N + 0.01 * V)`, evaluated in single precision because
    /// the value is user-observable in the `closed` broadcast. With no bets
    /// it is exactly 1.0 and the round explodes on the first tick.
    pub fn close_betting(&self) -> (u32, f32, f32) {
        let (n, v, me) = {
            let mut g = self.inner.lock();
            let mut n = g.forfeited.len() as u32;
            let mut v: f32 = g.forfeited.iter().sum();
            for p in &g.players {
                if p.bet > 0.0 {
                    n += 1;
                    v += p.bet;
                }
            }
            let me = (1.0f32 + n as f32 + 0.01f32 * v).sqrt();
            g.bet_count = n;
            g.bet_sum = v;
            g.explosion_point = me;
            g.multiplier = 1.0;
            g.phase = Phase::Flight;
            (n, v, me)
        };
        self.publish(Phase::Flight);
        (n, v, me)
    }

    /// Advance the multiplier by one step. Returns the new multiplier, or
    /// `None` once it reaches the explosion point: the round is then in
    /// Exploding and no further multiplier is broadcast.
    pub fn tick(&self) -> Option<f32> {
        let exploded = {
            let mut g = self.inner.lock();
            if g.phase != Phase::Flight {
                return None;
            }
            g.multiplier += 0.01;
            if g.multiplier >= g.explosion_point {
                g.phase = Phase::Exploding;
                None
            } else {
                Some(g.multiplier)
            }
        };
        match exploded {
            Some(m) => Some(m),
            None => {
                self.publish(Phase::Exploding);
                None
            }
        }
    }

    /// Cash out at the multiplier current at receipt. Valid only in Flight,
    /// with a live bet, at most once, and strictly before the explosion
    /// point. The settlement is applied inline so the player sees their
    /// payout without waiting for the round to end; the end-of-round pass
    /// skips seats settled here.
    pub fn record_cashout(&self, id: PlayerId) -> Result<Cashout, Reject> {
        let mut g = self.inner.lock();
        if g.phase != Phase::Flight {
            return Err(Reject::WrongPhase);
        }
        let m = g.multiplier;
        if m >= g.explosion_point {
            return Err(Reject::TooLate);
        }
        let idx = match g.ledger(id) {
            Some(p) if p.bet <= 0.0 => return Err(Reject::NoBet),
            Some(p) if p.cashout.is_some() => return Err(Reject::AlreadyCashedOut),
            Some(_) => id as usize - 1,
            None => return Err(Reject::WrongPhase),
        };
        let bet = g.players[idx].bet;
        let payout = bet * m;
        g.players[idx].cashout = Some(m);
        g.players[idx].settled = true;
        g.players[idx].profit += payout - bet;
        let player_profit = g.players[idx].profit;
        g.house_profit += bet - payout;
        Ok(Cashout {
            multiplier: m,
            payout,
            player_profit,
            house_profit: g.house_profit,
        })
    }

    /// End-of-round settlement. Every seat still holding an unsettled bet
    /// loses it to the house; seats settled by their own cash-out are
    /// reported but not touched again. Forfeited bets of disconnected
    /// players are credited to the house here.
    pub fn settle(&self) -> Vec<Settlement> {
        let report = {
            let mut g = self.inner.lock();
            g.phase = Phase::Settling;
            let mut report = Vec::new();
            for idx in 0..g.players.len() {
                let (bet, settled, cashout) = {
                    let p = &g.players[idx];
                    (p.bet, p.settled, p.cashout)
                };
                if bet <= 0.0 {
                    continue;
                }
                if !settled {
                    g.players[idx].profit -= bet;
                    g.players[idx].settled = true;
                    g.house_profit += bet;
                }
                report.push(Settlement {
                    id: idx as PlayerId + 1,
                    cashed_out: cashout.is_some(),
                    payout: cashout.map_or(0.0, |m| bet * m),
                    player_profit: g.players[idx].profit,
                });
            }
            let forfeited: f32 = g.forfeited.iter().sum();
            g.house_profit += forfeited;
            g.forfeited.clear();
            report
        };
        self.publish(Phase::Settling);
        report
    }

    /// Park the round when the table empties.
    pub fn set_idle(&self) {
        self.inner.lock().phase = Phase::Idle;
        self.publish(Phase::Idle);
    }

    /// Clear the ledger of a reused seat on admission: the new occupant
    /// starts with no bet and zero lifetime profit.
    pub fn reset_player(&self, id: PlayerId) {
        let mut g = self.inner.lock();
        if id >= 1 {
            if let Some(p) = g.players.get_mut(id as usize - 1) {
                *p = Ledger::default();
            }
        }
    }

    /// A seat went away. An unsettled bet in a live round stays in the
    /// aggregates and moves to the forfeit pool; everything else about the
    /// seat is wiped so the id can be reseated.
    pub fn forfeit(&self, id: PlayerId) {
        let mut g = self.inner.lock();
        if id < 1 {
            return;
        }
        let Some(p) = g.players.get(id as usize - 1).copied() else {
            return;
        };
        let live_round = matches!(g.phase, Phase::Betting | Phase::Flight | Phase::Exploding);
        if live_round && p.bet > 0.0 && !p.settled {
            g.forfeited.push(p.bet);
        }
        g.players[id as usize - 1] = Ledger::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn flight_with_bets(bets: &[(PlayerId, f32)]) -> RoundState {
        let round = RoundState::new(10);
        round.begin_betting();
        for &(id, amount) in bets {
            round.record_bet(id, amount).expect("bet accepted");
        }
        round.close_betting();
        round
    }

    /// Tick until the multiplier reaches at least `target`, panicking if the
    /// round explodes first.
    fn ride_to(round: &RoundState, target: f32) -> f32 {
        loop {
            let m = round.tick().expect("exploded before target");
            if m >= target {
                return m;
            }
        }
    }

    #[test]
    fn explosion_point_follows_bet_aggregates() {
        let round = flight_with_bets(&[(1, 100.0)]);
        let snap = round.snapshot();
        assert_eq!(snap.bet_count, 1);
        assert_eq!(snap.bet_sum, 100.0);
        assert_eq!(snap.explosion_point, 3.0f32.sqrt());
        assert_eq!(snap.multiplier, 1.0);
        assert_eq!(snap.phase, Phase::Flight);
    }

    #[test]
    fn empty_round_explodes_on_first_tick() {
        let round = RoundState::new(10);
        round.begin_betting();
        let (n, v, me) = round.close_betting();
        assert_eq!((n, v, me), (0, 0.0, 1.0));
        assert_eq!(round.tick(), None);
        assert_eq!(round.phase(), Phase::Exploding);
    }

    #[test]
    fn bets_only_during_betting() {
        let round = RoundState::new(10);
        assert_eq!(round.record_bet(1, 10.0), Err(Reject::WrongPhase));
        round.begin_betting();
        round.close_betting();
        assert_eq!(round.record_bet(1, 10.0), Err(Reject::WrongPhase));
    }

    #[test]
    fn bad_amounts_and_duplicates_are_rejected() {
        let round = RoundState::new(10);
        round.begin_betting();
        assert_eq!(round.record_bet(1, 0.0), Err(Reject::BadAmount));
        assert_eq!(round.record_bet(1, -5.0), Err(Reject::BadAmount));
        assert_eq!(round.record_bet(1, f32::NAN), Err(Reject::BadAmount));
        assert_eq!(round.record_bet(1, f32::INFINITY), Err(Reject::BadAmount));
        assert_eq!(round.record_bet(1, 25.0), Ok(()));
        assert_eq!(round.record_bet(1, 30.0), Err(Reject::DuplicateBet));
        // the rejected re-bet left no side effects
        let (n, v, _) = round.close_betting();
        assert_eq!(n, 1);
        assert_eq!(v, 25.0);
    }

    #[test]
    fn cashout_settles_inline_and_only_once() {
        let round = flight_with_bets(&[(1, 100.0)]);
        let m = ride_to(&round, 1.05);
        let receipt = round.record_cashout(1).expect("valid cashout");
        assert!((receipt.multiplier - m).abs() < EPS);
        assert!((receipt.payout - 100.0 * m).abs() < EPS);
        assert!((receipt.player_profit - (receipt.payout - 100.0)).abs() < EPS);
        assert!((receipt.house_profit + receipt.player_profit).abs() < EPS);
        assert_eq!(round.record_cashout(1), Err(Reject::AlreadyCashedOut));
    }

    #[test]
    fn cashout_requires_a_bet_and_flight() {
        let round = RoundState::new(10);
        round.begin_betting();
        assert_eq!(round.record_cashout(1), Err(Reject::WrongPhase));
        round.record_bet(1, 50.0).unwrap();
        round.close_betting();
        assert_eq!(round.record_cashout(2), Err(Reject::NoBet));
    }

    #[test]
    fn settle_pays_losers_to_the_house_and_skips_cashed_out() {
        // scenario: A and B bet 50 each, me = sqrt(1 + 2 + 1) = 2.0 exactly
        let round = flight_with_bets(&[(1, 50.0), (2, 50.0)]);
        assert_eq!(round.snapshot().explosion_point, 2.0);

        let m = ride_to(&round, 1.8);
        let receipt = round.record_cashout(1).expect("A cashes out");

        // ride B to the explosion
        while round.tick().is_some() {}
        let report = round.settle();
        assert_eq!(report.len(), 2);

        let a = report.iter().find(|s| s.id == 1).unwrap();
        let b = report.iter().find(|s| s.id == 2).unwrap();
        assert!(a.cashed_out);
        assert!((a.payout - 50.0 * m).abs() < EPS);
        assert!((a.player_profit - receipt.player_profit).abs() < EPS);
        assert!(!b.cashed_out);
        assert_eq!(b.payout, 0.0);
        assert!((b.player_profit + 50.0).abs() < EPS);

        // zero-sum: player deltas cancel the house delta
        let house = round.house_profit();
        assert!((a.player_profit + b.player_profit + house).abs() < EPS);
        assert!((house - (100.0 - a.payout)).abs() < EPS);
    }

    #[test]
    fn forfeited_bet_stays_in_aggregates_and_goes_to_the_house() {
        let round = RoundState::new(10);
        round.begin_betting();
        round.record_bet(1, 25.0).unwrap();
        round.forfeit(1);

        let (n, v, me) = round.close_betting();
        assert_eq!((n, v), (1, 25.0));
        assert_eq!(me, (1.0f32 + 1.0 + 0.25).sqrt());

        while round.tick().is_some() {}
        let report = round.settle();
        assert!(report.is_empty(), "no connected seat had a bet");
        assert!((round.house_profit() - 25.0).abs() < EPS);
    }

    #[test]
    fn forfeit_of_cashed_out_seat_costs_nothing_more() {
        let round = flight_with_bets(&[(1, 40.0)]);
        ride_to(&round, 1.1);
        let receipt = round.record_cashout(1).unwrap();
        round.forfeit(1);
        while round.tick().is_some() {}
        round.settle();
        // the house already paid the cashout, nothing was forfeited on top
        assert!((round.house_profit() - (40.0 - receipt.payout)).abs() < EPS);
    }

    #[test]
    fn reseated_id_starts_from_zero() {
        let round = flight_with_bets(&[(1, 60.0)]);
        while round.tick().is_some() {}
        round.settle();
        assert!(round.house_profit() > 0.0);

        round.forfeit(1);
        round.reset_player(1);
        round.begin_betting();
        let (n, v, _) = {
            round.record_bet(1, 10.0).unwrap();
            round.close_betting()
        };
        assert_eq!((n, v), (1, 10.0));
    }

    #[test]
    fn lifetime_profit_accumulates_across_rounds() {
        let round = RoundState::new(10);
        // round 1: lose 30
        round.begin_betting();
        round.record_bet(1, 30.0).unwrap();
        round.close_betting();
        while round.tick().is_some() {}
        let first = round.settle();
        assert!((first[0].player_profit + 30.0).abs() < EPS);

        // round 2: cash out a 100 bet
        round.begin_betting();
        round.record_bet(1, 100.0).unwrap();
        round.close_betting();
        ride_to(&round, 1.2);
        let receipt = round.record_cashout(1).unwrap();
        assert!(
            (receipt.player_profit - (-30.0 + receipt.payout - 100.0)).abs() < EPS,
            "profit carries the earlier loss"
        );
    }

    #[test]
    fn phase_transitions_are_published() {
        let round = RoundState::new(10);
        let rx = round.subscribe();
        assert_eq!(*rx.borrow(), Phase::Idle);
        round.begin_betting();
        assert_eq!(*rx.borrow(), Phase::Betting);
        round.close_betting();
        assert_eq!(*rx.borrow(), Phase::Flight);
    }
}
