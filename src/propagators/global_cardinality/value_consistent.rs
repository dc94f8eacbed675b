use fnv::FnvHashMap;

use crate::basic_types::Inconsistency;
use crate::basic_types::PropagationCost;
use crate::basic_types::PropagationOutcome;
use crate::basic_types::PropagationStatus;
use crate::engine::propagation::LocalId;
use crate::engine::propagation::PropagationContext;
use crate::engine::propagation::PropagationContextMut;
use crate::engine::propagation::Propagator;
use crate::engine::propagation::PropagatorInitialisationContext;
use crate::engine::propagation::ReadDomains;
use crate::engine::variables::IntegerVariable;
use crate::engine::DomainEvents;
use crate::engine::ModificationEvent;
use crate::propagators::global_cardinality::card_positions;
use crate::propagators::global_cardinality::check_subsumption;
use crate::propagators::global_cardinality::count_occurrences;
use crate::propagators::global_cardinality::initial_prune;
use crate::propagators::global_cardinality::Cardinality;

/// Value-consistent propagator for the global cardinality constraint.
///
/// A cheap counting loop: a value whose counter has reached its upper cardinality is removed
/// from every other variable, and a value supported by exactly as many variables as its lower
/// cardinality requires is forced onto all of them. Iterates until no rule applies.
#[derive(Clone, Debug)]
pub(crate) struct GccValuePropagator<Var, C> {
    vars: Box<[Var]>,
    cards: Box<[C]>,
    card_index: FnvHashMap<i32, usize>,
    closed: bool,
    initial_pruning_done: bool,
}

impl<Var: IntegerVariable, C: Cardinality> GccValuePropagator<Var, C> {
    pub(crate) fn new(vars: Box<[Var]>, cards: Box<[C]>, closed: bool) -> Self {
        let card_index = card_positions(&cards);
        GccValuePropagator {
            vars,
            cards,
            card_index,
            closed,
            initial_pruning_done: false,
        }
    }
}

impl<Var: IntegerVariable + 'static, C: Cardinality> Propagator for GccValuePropagator<Var, C> {
    fn name(&self) -> &str {
        "GccValue"
    }

    fn initialise_at_root(
        &mut self,
        context: &mut PropagatorInitialisationContext,
    ) -> Result<(), Inconsistency> {
        for (i, var) in self.vars.iter().enumerate() {
            context.register(var.clone(), DomainEvents::ANY_INT, LocalId::from(i as u32));
        }
        for (j, card) in self.cards.iter().enumerate() {
            let local_id = LocalId::from((self.vars.len() + j) as u32);
            card.register(context, DomainEvents::BOUNDS, local_id);
        }
        Ok(())
    }

    fn propagate(
        &mut self,
        mut context: PropagationContextMut,
        delta: ModificationEvent,
    ) -> PropagationStatus {
        if self.cards.is_empty() {
            return Ok(PropagationOutcome::Subsumed);
        }
        if !delta.has_changed() {
            return Ok(PropagationOutcome::AtFixpoint);
        }

        let mut change = ModificationEvent::None;
        if !self.initial_pruning_done {
            change = change.join(initial_prune(
                &mut context,
                &self.vars,
                &mut self.cards,
                &self.card_index,
                self.closed,
            )?);
            self.initial_pruning_done = true;
        }

        loop {
            let mut round = ModificationEvent::None;

            for slot in 0..self.cards.len() {
                let value = self.cards[slot].value();
                let (forced, possible) = count_occurrences(&context, &self.vars, value);
                self.cards[slot].set_counter(forced);

                round = round.join(self.cards[slot].require_at_least(context.assignments, forced)?);
                round =
                    round.join(self.cards[slot].require_at_most(context.assignments, possible)?);

                let min = self.cards[slot].min(context.assignments);
                let max = self.cards[slot].max(context.assignments);

                if forced == max && possible > forced {
                    // saturated: no further variable may take this value
                    for var in self.vars.iter() {
                        if !context.is_fixed(var) {
                            round = round.join(context.remove(var, value)?);
                        }
                    }
                } else if possible == min && possible > forced {
                    // every remaining supporter is needed
                    for var in self.vars.iter() {
                        if !context.is_fixed(var) && context.contains(var, value) {
                            round = round.join(context.assign(var, value)?);
                        }
                    }
                }
            }

            change = change.join(round);
            if !round.has_changed() {
                break;
            }
        }

        if let Some(outcome) = check_subsumption(&mut context, &self.vars, &mut self.cards)? {
            return Ok(outcome);
        }
        Ok(if change.has_changed() {
            PropagationOutcome::NotAtFixpoint
        } else {
            PropagationOutcome::AtFixpoint
        })
    }

    fn cost(&self, _context: PropagationContext, _delta: ModificationEvent) -> PropagationCost {
        PropagationCost::LinearHigh
    }

    fn priority(&self) -> u32 {
        1
    }

    fn boxed_clone(&self) -> Box<dyn Propagator> {
        Box::new(self.clone())
    }
}
