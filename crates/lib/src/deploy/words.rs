//! Word pairs for `--random-route` hostnames.

use rand::seq::SliceRandom;

const ADJECTIVES: &[&str] = &[
  "accountable", "active", "agile", "anxious", "appreciative", "balanced", "boisterous", "bold", "boring", "brash",
  "brave", "bright", "busy", "chatty", "cheerful", "chipper", "comedic", "courteous", "daring", "delightful",
  "empathic", "excellent", "exhausted", "fantastic", "fearless", "fluent", "forgiving", "friendly", "funny",
  "generous", "grateful", "grumpy", "happy", "humble", "humorous", "insightful", "intelligent", "interested",
  "kind", "lean", "nice", "noisy", "optimistic", "patient", "persistent", "proud", "quick", "quiet", "reflective",
  "relaxed", "reliable", "responsible", "responsive", "rested", "restless", "shiny", "shy", "silly", "sleepy",
  "smart", "spontaneous", "surprised", "sweet", "talkative", "terrific", "thankful", "timely", "tired", "turbulent",
  "unexpected", "wacky", "wise", "zany",
];

const NOUNS: &[&str] = &[
  "aardvark", "alligator", "antelope", "armadillo", "baboon", "badger", "bandicoot", "bat", "bear", "bilby",
  "bongo", "bonobo", "buffalo", "bushbuck", "camel", "capybara", "cassowary", "cat", "cheetah", "chimpanzee",
  "chipmunk", "civet", "crane", "crocodile", "dingo", "dog", "dugong", "duiker", "echidna", "eland", "elephant",
  "emu", "fossa", "fox", "gazelle", "gecko", "gelada", "genet", "gerenuk", "giraffe", "gnu", "gorilla", "grysbok",
  "hartebeest", "hedgehog", "hippopotamus", "hyena", "hyrax", "impala", "jackal", "jaguar", "kangaroo", "klipspringer",
  "koala", "kob", "kookaburra", "kudu", "lemur", "leopard", "lion", "lizard", "llama", "lynx", "meerkat", "mongoose",
  "numbat", "nyala", "okapi", "oribi", "oryx", "ostrich", "otter", "panda", "pangolin", "panther", "parrot",
  "platypus", "porcupine", "possum", "puku", "quokka", "quoll", "rabbit", "ratel", "raven", "reedbuck", "rhinoceros",
  "roan", "sable", "serval", "shark", "sitatunga", "springhare", "squirrel", "swan", "tiger", "topi", "toucan",
  "turtle", "wallaby", "warthog", "waterbuck", "wildebeest", "wolf", "wolverine", "wombat", "zebra",
];

/// A random `adjective-noun` pair.
pub fn babble() -> String {
  let mut rng = rand::thread_rng();
  let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quick");
  let noun = NOUNS.choose(&mut rng).copied().unwrap_or("fox");
  format!("{}-{}", adjective, noun)
}
